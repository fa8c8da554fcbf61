//! Check-in processing: guest lists → attendance tokens.
//!
//! For every active event of every operator, checked-in guests with a usable wallet get
//! exactly one token record, created before the mint is submitted. A failed mint leaves
//! the record unconfirmed and never stops the rest of the pass.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::core::minter::{mint_metadata, AttendanceMinter};
use crate::models::errors::{AppResult, ErrorCode};
use crate::models::types::{CheckInReport, Event, Guest, NewAttendanceToken, OperatorCredential, PassReport};
use crate::providers::luma::EventsProvider;
use crate::storage::{CredentialRepository, EventRepository, TokenRepository};
use crate::telemetry::TelemetryCollector;
use crate::utils::address::AddressCodec;
use crate::utils::clock::Clock;

/// Spacing between operators and between events of one operator
#[derive(Debug, Clone, Copy)]
pub struct CheckInDelays {
    pub operator: Duration,
    pub event: Duration,
}

enum GuestOutcome {
    NotCheckedIn,
    MissingWallet,
    InvalidWallet,
    AlreadyMinted,
    Minted,
    MintFailed(String),
}

pub struct CheckInProcessor {
    provider: Arc<dyn EventsProvider>,
    events: Arc<dyn EventRepository>,
    tokens: Arc<dyn TokenRepository>,
    credentials: Arc<dyn CredentialRepository>,
    minter: Arc<AttendanceMinter>,
    clock: Arc<dyn Clock>,
    delays: CheckInDelays,
    telemetry: Arc<TelemetryCollector>,
    /// SS58 prefix every stored owner is encoded with
    network_id: u16,
}

impl CheckInProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: Arc<dyn EventsProvider>,
        events: Arc<dyn EventRepository>,
        tokens: Arc<dyn TokenRepository>,
        credentials: Arc<dyn CredentialRepository>,
        minter: Arc<AttendanceMinter>,
        clock: Arc<dyn Clock>,
        delays: CheckInDelays,
        telemetry: Arc<TelemetryCollector>,
        network_id: u16,
    ) -> Self {
        Self {
            provider,
            events,
            tokens,
            credentials,
            minter,
            clock,
            delays,
            telemetry,
            network_id,
        }
    }

    /// Process every operator's active events, sequentially
    pub async fn process_all(&self) -> PassReport<CheckInReport> {
        self.telemetry.record_checkin_pass();
        let mut pass = PassReport::default();

        let operators = match self.credentials.operators_with_credentials().await {
            Ok(ops) => ops,
            Err(e) => {
                error!("❌ Cannot list operators: {}", e);
                self.telemetry.record_pass_failure();
                pass.failed.push(("*".to_string(), e.to_string()));
                return pass;
            }
        };
        info!("📋 Check-in pass: {} operator(s)", operators.len());

        for (i, credential) in operators.iter().enumerate() {
            if i > 0 {
                self.clock.sleep(self.delays.operator).await;
            }
            match self.process_operator(credential).await {
                Ok(report) => {
                    pass.completed.extend(report.completed);
                    pass.failed.extend(report.failed);
                }
                Err(e) => {
                    warn!("⚠️ Check-ins for operator {} aborted: {}", credential.operator_id, e);
                    self.telemetry.record_pass_failure();
                    pass.failed.push((credential.operator_id.clone(), e.to_string()));
                }
            }
        }

        pass
    }

    /// Process one operator's active events. A rejected credential aborts the operator;
    /// any other per-event failure is recorded and the next event is processed.
    pub async fn process_operator(&self, credential: &OperatorCredential) -> AppResult<PassReport<CheckInReport>> {
        let events = self.events.active_events(&credential.operator_id).await?;
        debug!("📅 Operator {}: {} active event(s)", credential.operator_id, events.len());

        let mut pass = PassReport::default();
        for (i, event) in events.iter().enumerate() {
            if i > 0 {
                self.clock.sleep(self.delays.event).await;
            }
            match self.process_event(credential, event).await {
                Ok(report) => pass.completed.push(report),
                Err(e) if e.code.is_credential_failure() => return Err(e),
                Err(e) => {
                    warn!("⚠️ Check-ins for event {} skipped: {}", event.id, e);
                    self.telemetry.record_pass_failure();
                    pass.failed.push((event.id.clone(), e.to_string()));
                }
            }
        }
        Ok(pass)
    }

    /// Process one event's guest list. Only the guest-list fetch can fail the call.
    pub async fn process_event(&self, credential: &OperatorCredential, event: &Event) -> AppResult<CheckInReport> {
        let guests = self.provider.get_event_guests(&credential.api_key, &event.id).await?;
        let mut report = CheckInReport {
            event_id: event.id.clone(),
            total_guests: guests.len(),
            ..Default::default()
        };

        for guest in &guests {
            match self.process_guest(event, guest).await {
                GuestOutcome::NotCheckedIn => {}
                outcome => {
                    report.checked_in += 1;
                    match outcome {
                        GuestOutcome::MissingWallet => report.missing_wallet += 1,
                        GuestOutcome::InvalidWallet => report.invalid_wallet += 1,
                        GuestOutcome::AlreadyMinted => report.already_minted += 1,
                        GuestOutcome::Minted => report.minted += 1,
                        GuestOutcome::MintFailed(reason) => {
                            report.mint_failures += 1;
                            report.errors.push(reason);
                        }
                        GuestOutcome::NotCheckedIn => {}
                    }
                }
            }
        }

        self.telemetry.record_checkins(&report);
        if report.minted > 0 || report.mint_failures > 0 {
            info!(
                "🎟️ Event {}: {} minted, {} failed, {} already minted ({} checked in / {} guests)",
                event.id, report.minted, report.mint_failures, report.already_minted, report.checked_in, report.total_guests
            );
        } else {
            debug!("✅ Event {}: nothing to mint", event.id);
        }
        Ok(report)
    }

    async fn process_guest(&self, event: &Event, guest: &Guest) -> GuestOutcome {
        if !guest.is_checked_in() {
            return GuestOutcome::NotCheckedIn;
        }
        let Some(wallet) = guest.wallet_address() else {
            debug!("👤 {} checked in without a wallet", guest.display_name());
            return GuestOutcome::MissingWallet;
        };
        let Some(owner) = canonical_wallet(&wallet, self.network_id) else {
            warn!("⚠️ {} supplied an unusable wallet address", guest.display_name());
            return GuestOutcome::InvalidWallet;
        };

        match self.tokens.token_exists(&event.id, &owner).await {
            Ok(true) => return GuestOutcome::AlreadyMinted,
            Ok(false) => {}
            Err(e) => return GuestOutcome::MintFailed(format!("{}: {}", owner, e)),
        }

        let metadata = mint_metadata(event, guest.display_name(), checked_in_time(guest));
        let token = match self
            .tokens
            .create_token(NewAttendanceToken {
                event_id: event.id.clone(),
                owner: owner.clone(),
                metadata: metadata.clone(),
            })
            .await
        {
            Ok(token) => token,
            Err(e) if e.code == ErrorCode::StoreConflict => return GuestOutcome::AlreadyMinted,
            Err(e) => return GuestOutcome::MintFailed(format!("{}: {}", owner, e)),
        };

        match self.minter.try_mint(&event.id, &owner, &metadata).await {
            Ok(hash) => {
                if let Err(e) = self.tokens.record_mint(token.id, &hash, true).await {
                    // The transaction is out; only the local bookkeeping is behind.
                    error!("❌ Token #{} minted as {} but not recorded: {}", token.id, hash, e);
                }
                GuestOutcome::Minted
            }
            Err(e) => {
                warn!("❌ Mint for token #{} failed [{}]: {}", token.id, e.code_str(), e.message);
                GuestOutcome::MintFailed(format!("{}: {}", owner, e))
            }
        }
    }
}

/// Decode a guest-supplied wallet and re-encode it as a checksummed address on
/// `network_id`, whatever prefix the guest typed it with.
/// Strings that only resolve through the hash fallback are not wallets.
pub fn canonical_wallet(wallet: &str, network_id: u16) -> Option<String> {
    let decoded = AddressCodec::decode(wallet);
    if !decoded.is_account() {
        return None;
    }
    AddressCodec::encode(&decoded.public_key, network_id).ok()
}

/// RFC 3339 check-in timestamp, or now when the provider only sent a flag
fn checked_in_time(guest: &Guest) -> DateTime<Utc> {
    guest
        .checked_in_at
        .as_ref()
        .and_then(|v| v.as_str())
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}
