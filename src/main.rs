//! Attendance Minter - event sync and attendance NFT minting service
//!
//! Startup order: config, signer, contract, chain submitter, provider client, scheduler.
//! Any failure before the scheduler starts is fatal.

use attendance_minter::core::{
    AttendanceMinter, CallEncoder, CheckInDelays, CheckInProcessor, ContractContext, EventSyncReconciler,
    GasLimit, ScheduleTiming, Selector, SignerIdentity, SimulatedSubmitter, SubmitterConfig, SubstrateSubmitter,
    SyncScheduler, TransactionSubmitter,
};
use attendance_minter::models::MinterConfig;
use attendance_minter::providers::{LumaClient, RateLimiter, SubstrateRpc};
use attendance_minter::storage::InMemoryStore;
use attendance_minter::telemetry::TelemetryCollector;
use attendance_minter::utils::clock::{Clock, TokioClock};
use attendance_minter::utils::constants::{APP_NAME, APP_VERSION};

use eyre::{Result, WrapErr};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    info!("🚀 {} v{} starting", APP_NAME, APP_VERSION);

    let config = MinterConfig::from_env().wrap_err("configuration")?;
    config.log_summary();

    let signer = Arc::new(SignerIdentity::from_uri(&config.chain.signer_uri).wrap_err("signer identity")?);
    signer.log_identity(config.chain.ss58_prefix);

    let encoder = CallEncoder::new(
        Selector(config.chain.mint_selector),
        Selector(config.chain.create_event_selector),
    );
    let contract = Arc::new(ContractContext::resolve(&config.chain.contract_address, encoder).wrap_err("contract address")?);

    let submitter: Arc<dyn TransactionSubmitter> = if config.chain.sandbox {
        Arc::new(SimulatedSubmitter::new())
    } else {
        let rpc = SubstrateRpc::connect(
            &config.chain.rpc_url,
            &config.chain.contracts_pallet,
            config.chain.rpc_timeout,
        )
        .await
        .wrap_err("chain connection")?;
        Arc::new(SubstrateSubmitter::new(
            Arc::new(rpc),
            signer.clone(),
            SubmitterConfig {
                gas_limit: GasLimit {
                    ref_time: config.chain.gas_ref_time,
                    proof_size: config.chain.gas_proof_size,
                },
                storage_deposit_limit: config.chain.storage_deposit_limit,
                mortal_period: config.chain.mortal_period,
                dry_run: config.chain.dry_run,
            },
        ))
    };
    let minter = Arc::new(AttendanceMinter::new(contract, submitter));

    let clock: Arc<dyn Clock> = Arc::new(TokioClock);
    let limiter = Arc::new(RateLimiter::new(
        config.provider.request_interval,
        config.provider.max_retries,
        clock.clone(),
    ));
    let provider = Arc::new(LumaClient::new(
        config.provider.base_url.clone(),
        config.provider.timeout,
        limiter,
        config.provider.max_retries,
    )?);

    let store = Arc::new(InMemoryStore::with_credentials(config.operators.clone()));
    if config.operators.is_empty() {
        warn!("⚠️ OPERATOR_CREDENTIALS is empty; passes will have nothing to do");
    }

    let telemetry = Arc::new(TelemetryCollector::new());

    let reconciler = Arc::new(EventSyncReconciler::new(
        provider.clone(),
        store.clone(),
        store.clone(),
        clock.clone(),
        config.schedule.sync_operator_delay,
        telemetry.clone(),
    ));
    let checkins = Arc::new(CheckInProcessor::new(
        provider,
        store.clone(),
        store.clone(),
        store,
        minter,
        clock.clone(),
        CheckInDelays {
            operator: config.schedule.checkin_operator_delay,
            event: config.schedule.event_delay,
        },
        telemetry.clone(),
        config.chain.ss58_prefix,
    ));
    let scheduler = Arc::new(SyncScheduler::new(
        reconciler,
        checkins,
        clock,
        ScheduleTiming {
            interval: config.schedule.sync_interval,
            checkin_offset: config.schedule.checkin_offset,
            startup_delay: config.schedule.startup_delay,
        },
    ));

    let runner = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run().await })
    };

    tokio::signal::ctrl_c().await.wrap_err("signal handler")?;
    println!("\n🛑 Shutting down gracefully (finishing the current pass)...");
    scheduler.stop();
    if let Err(e) = runner.await {
        warn!("⚠️ Scheduler task ended abnormally: {}", e);
    }

    println!("{}", telemetry.get_stats().summary());
    Ok(())
}
