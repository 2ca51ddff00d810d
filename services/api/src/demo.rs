use crate::infra::Services;
use clap::Args;
use protest_desk::config::{AppConfig, AppEnvironment, ServerConfig, StoreBackend, StoreConfig};
use protest_desk::config::{TelemetryConfig, WorkflowConfig};
use protest_desk::error::AppError;
use protest_desk::store::{find_entity, upsert_entity, MemoryStore, DEMO_REFERRAL_CODE};
use protest_desk::workflows::graph::{EntityKind, Protest};
use protest_desk::workflows::intake::{IntakeError, IntakePayload, IntakeReceipt};
use protest_desk::workflows::protest::ProtestStatus;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// County offer quoted in the protest recommendation.
    #[arg(long, default_value_t = 455_000.0)]
    pub(crate) offer: f64,
    /// Leave the demo customer in place instead of deleting them at the end.
    #[arg(long)]
    pub(crate) keep_customer: bool,
}

fn demo_config() -> AppConfig {
    AppConfig {
        environment: AppEnvironment::Development,
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
        },
        telemetry: TelemetryConfig {
            log_level: "warn".to_string(),
        },
        store: StoreConfig {
            backend: StoreBackend::Memory,
            sqlite_path: "data/demo.db".into(),
            seed_demo: true,
        },
        workflows: WorkflowConfig::default(),
    }
}

fn individual_submission() -> IntakePayload {
    IntakePayload {
        email: "avery.chen@example.com".to_string(),
        first_name: "Avery".to_string(),
        last_name: "Chen".to_string(),
        phone: "512-555-0142".to_string(),
        property_address: "1817 Enfield Rd, Austin, TX 78703".to_string(),
        county: Some("Travis".to_string()),
        parcel_number: Some("0110030405".to_string()),
        assessed_value: Some(510_000.0),
        estimated_savings: Some(1_400.0),
        signature: Some("Avery Chen".to_string()),
        referral_code: Some(DEMO_REFERRAL_CODE.to_string()),
        ..IntakePayload::default()
    }
}

fn trust_submission() -> IntakePayload {
    IntakePayload {
        email: "trustee@acmetrust.example".to_string(),
        first_name: "Robin".to_string(),
        last_name: "Okafor".to_string(),
        phone: "512-555-0177".to_string(),
        property_address: "600 W 6th St, Austin, TX 78701".to_string(),
        county: Some("Travis".to_string()),
        is_trust_entity: true,
        entity_name: Some("Acme Trust".to_string()),
        entity_type: Some("trust".to_string()),
        ..IntakePayload::default()
    }
}

fn print_receipt(label: &str, receipt: &IntakeReceipt) {
    println!("\n{label}");
    println!("  profile:      {}", receipt.profile_id);
    println!("  owner:        {}", receipt.owner_id);
    println!("  property:     {}", receipt.property_id);
    println!("  protest:      {}", receipt.protest_id);
    println!(
        "  confirmation: {}",
        if receipt.requires_email_confirmation {
            "email confirmation required"
        } else {
            "existing login reused"
        }
    );
    println!(
        "  documents:    {}",
        receipt
            .documents_requested
            .iter()
            .map(|kind| kind.label())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  referral:     {}", receipt.referral_linked);
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        offer,
        keep_customer,
    } = args;

    let config = demo_config();
    let store = Arc::new(MemoryStore::with_demo_seed()?);
    let services = Services::with_store(store.clone(), &config);

    println!("Protest desk demo");

    let individual = match services.intake.submit(individual_submission()) {
        Ok(receipt) => receipt,
        Err(err) => {
            println!("  intake failed: {err}");
            return Ok(());
        }
    };
    print_receipt("Individual owner intake", &individual);

    match services.intake.submit(trust_submission()) {
        Ok(receipt) => print_receipt("Trust owner intake", &receipt),
        Err(err) => println!("\nTrust owner intake failed: {err}"),
    }

    println!("\nDuplicate submissions");
    let duplicate_email = IntakePayload {
        property_address: "4 Different Ln, Austin, TX 78702".to_string(),
        ..individual_submission()
    };
    let duplicate_address = IntakePayload {
        email: "someone.else@example.com".to_string(),
        ..individual_submission()
    };
    for (label, payload) in [("same email", duplicate_email), ("same address", duplicate_address)] {
        match services.intake.submit(payload) {
            Err(IntakeError::Rejected(rejection)) => {
                println!("  {label:<13} -> {} ({rejection})", rejection.code())
            }
            Err(err) => println!("  {label:<13} -> failed: {err}"),
            Ok(_) => println!("  {label:<13} -> unexpectedly accepted"),
        }
    }

    println!("\nProtest review");
    let protests = services.protests.as_ref();
    protests.set_status(&individual.protest_id, ProtestStatus::Filed)?;
    protests.set_status(&individual.protest_id, ProtestStatus::OfferReceived)?;

    if let Some(mut protest) =
        find_entity::<_, Protest>(services.store.as_ref(), &individual.protest_id)?
    {
        protest.recommendation = Some(format!(
            "County informal offer of ${offer:.2}; recommend accepting"
        ));
        upsert_entity(services.store.as_ref(), &protest, "id")?;
    }

    let actions = protests.review_actions(&individual.protest_id)?;
    println!(
        "  status {} | offer {} | accept {} | reject {}",
        actions.status,
        actions
            .offer_amount
            .map_or_else(|| "n/a".to_string(), |amount| format!("${amount:.2}")),
        actions.can_accept,
        actions.can_reject
    );
    match protests.accept_offer(&individual.protest_id) {
        Ok(resolution) => {
            println!(
                "  accepted: savings ${:.2}",
                resolution.protest.savings_amount
            );
            if let Some(bill) = resolution.bill {
                println!("  bill {} for ${:.2}", bill.id, bill.amount);
            }
        }
        Err(err) => println!("  accept failed: {err}"),
    }

    if keep_customer {
        return Ok(());
    }

    println!("\nCustomer deletion");
    let report = services
        .deletion
        .delete_customer(&individual.profile_id, None)?;
    println!("  {}", report.summary());
    let repeat = services
        .deletion
        .delete_customer(&individual.profile_id, Some("Avery Chen"))?;
    println!("  second run: {}", repeat.summary());
    println!(
        "  remaining: {} profiles, {} properties, {} identities",
        store.count(EntityKind::Profile),
        store.count(EntityKind::Property),
        services.identity.len()
    );

    Ok(())
}
