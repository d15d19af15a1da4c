use tracing::error;

use crate::error::ValidationFailure;
use crate::model::{is_competition_name, League, PlayerRecord};

/// How many offending records a failure carries for the operator.
pub const SAMPLE_SIZE: usize = 5;

/// Reject a finished job if any record's team is one of the league's own
/// competition labels; that only happens when the team probe drifted onto the
/// league link after a markup change.
pub fn validate_job(
    league: &League,
    version: u16,
    records: &[PlayerRecord],
) -> Result<(), ValidationFailure> {
    let names = league.competition_names(version);
    let offending: Vec<&PlayerRecord> = records
        .iter()
        .filter(|record| is_competition_name(&record.team, &names))
        .collect();

    if offending.is_empty() {
        return Ok(());
    }

    let sample: Vec<PlayerRecord> = offending
        .iter()
        .take(SAMPLE_SIZE)
        .map(|r| (*r).clone())
        .collect();
    for record in &sample {
        error!(
            league = %league.code,
            version,
            name = %record.name,
            team = %record.team,
            "competition name captured as team"
        );
    }

    Err(ValidationFailure {
        league: league.code.clone(),
        version,
        offending_count: offending.len(),
        sample,
    })
}
