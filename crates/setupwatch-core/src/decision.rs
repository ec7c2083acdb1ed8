//! Power-off decision

use setupwatch_api::{IdleBucket, Occupancy, PortState};
use setupwatch_config::IdleThresholds;

/// Decide whether a workstation's outlets should be switched off.
///
/// Pure function of its inputs. Returns false when no bound port is on,
/// for offline hosts, and for sessions with no measurable idle time.
pub fn decide(
    thresholds: &IdleThresholds,
    occupancy: Occupancy,
    idle: &IdleBucket,
    ports: &[PortState],
) -> bool {
    if !ports.iter().any(PortState::is_on) {
        return false;
    }

    let limit = match occupancy {
        Occupancy::Disconnected => thresholds.disconnected_minutes,
        Occupancy::Active => thresholds.active_minutes,
        Occupancy::Offline => return false,
    };

    match idle {
        IdleBucket::Minutes { minutes, .. } => *minutes > limit,
        IdleBucket::Saturated => true,
        IdleBucket::Zero | IdleBucket::ActiveTyping | IdleBucket::Offline => false,
    }
}
