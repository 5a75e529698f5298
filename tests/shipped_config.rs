use std::path::Path;

use setrace::{AppConfig, OrchestratorConfig};

fn shipped_config() -> AppConfig {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("config");
    AppConfig::load_from(&dir).expect("shipped config should parse")
}

/// The config directory in the repo must describe a playable classic game.
#[test]
fn shipped_config_is_valid() {
    let config = shipped_config();
    if let Err(errors) = config.validate() {
        panic!("shipped config should validate, got: {errors:?}");
    }
    assert_eq!(config.game.table_size(), 12, "classic 3x4 table");
    assert_eq!(config.game.deck_size(), 81, "classic 81-card deck");
}

/// Orchestrator settings derived from the shipped config keep every timing.
#[test]
fn shipped_config_maps_onto_orchestrator() {
    let config = shipped_config();
    let orchestrator = OrchestratorConfig::from(&config);

    assert_eq!(orchestrator.table_size, config.game.table_size());
    assert_eq!(orchestrator.deck_size, config.game.deck_size());
    assert_eq!(orchestrator.set_size, 3);
    assert_eq!(
        orchestrator.max_agents,
        config.players.total(),
        "claim queue is sized for every player"
    );
    assert_eq!(orchestrator.turn_timeout_ms, config.timing.turn_timeout_ms);
    assert_eq!(
        orchestrator.penalty_freeze_ms,
        config.timing.penalty_freeze_ms
    );
}
