use std::process::ExitCode;

use scrapyard_engine::{Category, EntityId, InteractableKind, Vec2};
use tracing::{error, info, warn};

use super::bootstrap::AppWiring;
use super::report::{write_report, Outcome, ResetReport};
use super::session::{GameSession, SessionError, Transition};

const AIM: Vec2 = Vec2::new(1.0, 0.0);
const SCRIPTED_DEATH_DAMAGE: u32 = 100;
// Upper bound on map transitions so a looping map set cannot hang the run.
const MAX_TRANSITIONS: usize = 64;

pub(crate) fn run(mut app: AppWiring) -> ExitCode {
    let outcome = match play_scripted(&mut app.session) {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(error = %err, "playthrough_failed");
            Outcome::Failed
        }
    };

    if let Some(last) = app.session.diagnostics().snapshot() {
        info!(
            map = %last.map,
            sequence = last.sequence,
            phase = ?last.phase,
            entity_count = last.after.total(),
            "last_reset"
        );
    }

    let report = ResetReport::new(outcome, app.session.history());
    match write_report(&app.paths.cache_dir, &report) {
        Ok(path) => info!(
            path = %path.display(),
            sessions = report.sessions.len(),
            ?outcome,
            "reset_report_written"
        ),
        Err(err) => {
            error!(error = %err, "reset_report_failed");
            return ExitCode::FAILURE;
        }
    }

    match outcome {
        Outcome::Failed => ExitCode::FAILURE,
        Outcome::Escaped | Outcome::Stuck => ExitCode::SUCCESS,
    }
}

/// Drives a session through every map: shoot once, die once on the first
/// map, loot every chest, then drive off.
pub(crate) fn play_scripted(session: &mut GameSession) -> Result<Outcome, SessionError> {
    session.start()?;

    if session.damage_player(SCRIPTED_DEATH_DAMAGE)? {
        session.restart_map()?;
    }

    for _ in 0..MAX_TRANSITIONS {
        session.fire_projectile(AIM)?;
        for (id, position) in unopened_chests(session) {
            session.move_player_to(position)?;
            session.open_chest(id)?;
        }

        match session.try_escape() {
            Ok(Transition::Escaped { from }) => {
                info!(map = %from, "playthrough_escaped");
                return Ok(Outcome::Escaped);
            }
            Ok(transition) => info!(?transition, "map_transition"),
            Err(SessionError::NotEnoughParts {
                collected,
                required,
            }) => {
                warn!(
                    map = ?session.current_map(),
                    collected,
                    required,
                    "playthrough_stuck"
                );
                return Ok(Outcome::Stuck);
            }
            Err(other) => return Err(other),
        }
    }

    warn!(limit = MAX_TRANSITIONS, "transition_limit_reached");
    Ok(Outcome::Stuck)
}

fn unopened_chests(session: &GameSession) -> Vec<(EntityId, Vec2)> {
    session
        .registry()
        .entities_of(Category::Chest)
        .filter(|chest| {
            matches!(
                chest.interactable.map(|interactable| interactable.kind),
                Some(InteractableKind::Chest { opened: false, .. })
            )
        })
        .map(|chest| (chest.id(), chest.position))
        .collect()
}
