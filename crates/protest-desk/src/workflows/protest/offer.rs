use std::sync::OnceLock;

use regex::Regex;

use crate::workflows::graph::Protest;

fn dollar_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\s*([0-9]{1,3}(?:,[0-9]{3})+|[0-9]+)(\.[0-9]{1,2})?")
            .unwrap_or_else(|err| panic!("dollar pattern is a valid regex: {err}"))
    })
}

/// First dollar figure in free text, e.g. "Accept county offer of $312,500".
///
/// Best effort only: the first `$` amount wins even if the sentence mentions
/// several.
pub fn parse_dollar_amount(text: &str) -> Option<f64> {
    let captures = dollar_pattern().captures(text)?;
    let whole = captures.get(1)?.as_str().replace(',', "");
    let cents = captures.get(2).map_or("", |m| m.as_str());
    format!("{whole}{cents}").parse().ok()
}

/// The county's offer: the structured column when set, otherwise the amount
/// parsed out of the recommendation text.
pub fn resolve_offer_amount(protest: &Protest) -> Option<f64> {
    let usable = |amount: &f64| amount.is_finite() && *amount > 0.0;
    protest.offer_amount.filter(usable).or_else(|| {
        protest
            .recommendation
            .as_deref()
            .and_then(parse_dollar_amount)
            .filter(usable)
    })
}
