//! Tests for PlacementManager
//!
//! These tests verify:
//! - Tier decisions for point keys, through the cache and the table
//! - Move commands on threshold crossings, cooling and flushes
//! - Periodic cooling ticks
//! - Checkpoint and restore through the data directory
//! - Config validation on construction

use std::sync::Arc;
use std::thread;

use bytes::Bytes;
use crossbeam::channel::Receiver;
use heatrange::{
    BytewiseComparator, HeatError, KeyComparator, MoveCommand, PlacementConfig, PlacementManager,
    PureKeyComparator,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn config(temp_dir: &TempDir) -> PlacementConfig {
    PlacementConfig::builder()
        .data_dir(temp_dir.path())
        .target_len(10)
        .boiling_point(10)
        .freezing_point(3)
        .cooling_period(3)
        .cooling_factor(0.5)
        .build()
}

fn manager(temp_dir: &TempDir) -> (PlacementManager, Receiver<MoveCommand>) {
    PlacementManager::with_channel(config(temp_dir), Arc::new(BytewiseComparator)).unwrap()
}

fn command(start: &[u8], end: &[u8], to_fast_tier: bool) -> MoveCommand {
    MoveCommand {
        start: Bytes::copy_from_slice(start),
        end: Bytes::copy_from_slice(end),
        to_fast_tier,
    }
}

fn drain(rx: &Receiver<MoveCommand>) -> Vec<MoveCommand> {
    rx.try_iter().collect()
}

// =============================================================================
// Tier Decision Tests
// =============================================================================

#[test]
fn test_unknown_key_defaults_to_slow_tier() {
    let temp_dir = TempDir::new().unwrap();
    let (mgr, _rx) = manager(&temp_dir);

    assert!(!mgr.should_store_in_fast_tier(b"anything"));
    assert!(!mgr.cache().is_valid());
}

#[test]
fn test_hot_range_goes_to_fast_tier() {
    let temp_dir = TempDir::new().unwrap();
    let (mgr, _rx) = manager(&temp_dir);
    mgr.record_access(&[10], &[20], 12).unwrap();

    assert!(mgr.should_store_in_fast_tier(&[15]));
    assert_eq!(mgr.cache().lookup(&[15]), Some(true));

    // answered from the cache
    assert!(mgr.should_store_in_fast_tier(&[20]));
}

#[test]
fn test_cold_range_decision_is_cached() {
    let temp_dir = TempDir::new().unwrap();
    let (mgr, _rx) = manager(&temp_dir);
    mgr.record_access(&[10], &[20], 2).unwrap();

    assert!(!mgr.should_store_in_fast_tier(&[15]));
    assert_eq!(mgr.cache().lookup(&[12]), Some(false));
    assert_eq!(mgr.cache().lookup(&[25]), None);
}

#[test]
fn test_crossing_invalidates_cached_decision() {
    let temp_dir = TempDir::new().unwrap();
    let (mgr, _rx) = manager(&temp_dir);
    mgr.record_access(&[10], &[20], 5).unwrap();
    assert!(!mgr.should_store_in_fast_tier(&[15]));

    mgr.record_access(&[10], &[20], 5).unwrap();

    assert!(!mgr.cache().is_valid());
    assert!(mgr.should_store_in_fast_tier(&[15]));
}

#[test]
fn test_cold_range_with_hot_segment_inside_is_not_cached() {
    let temp_dir = TempDir::new().unwrap();
    let (mgr, _rx) = manager(&temp_dir);
    mgr.record_access(&[0], &[10], 5).unwrap();
    mgr.record_access(&[3], &[4], 20).unwrap();

    assert!(!mgr.should_store_in_fast_tier(&[1]));
    assert!(!mgr.cache().is_valid());

    assert!(mgr.should_store_in_fast_tier(&[3]));
    let table_says = mgr.table().find_seg(&[3]).unwrap().heat >= mgr.table().boiling_point();
    assert_eq!(mgr.should_store_in_fast_tier(&[3]), table_says);
    assert!(!mgr.should_store_in_fast_tier(&[6]));
}

#[test]
fn test_hot_decision_is_cached_over_cold_background() {
    let temp_dir = TempDir::new().unwrap();
    let (mgr, _rx) = manager(&temp_dir);
    mgr.record_access(&[0], &[10], 5).unwrap();
    mgr.record_access(&[3], &[4], 20).unwrap();

    assert!(mgr.should_store_in_fast_tier(&[3]));
    assert_eq!(mgr.cache().lookup(&[4]), Some(true));
    assert_eq!(mgr.cache().lookup(&[5]), None);
}

#[test]
fn test_boiling_without_crossing_invalidates_cached_decision() {
    let temp_dir = TempDir::new().unwrap();
    let (mgr, rx) = manager(&temp_dir);
    mgr.record_access(&[0], &[10], 5).unwrap();
    mgr.set_tier_flag(&[0], &[10], true);
    assert!(!mgr.should_store_in_fast_tier(&[5]));
    assert!(mgr.cache().is_valid());

    // already in the fast tier, so no crossing is reported
    mgr.record_access(&[0], &[10], 10).unwrap();

    assert!(drain(&rx).is_empty());
    assert!(!mgr.cache().is_valid());
    assert!(mgr.should_store_in_fast_tier(&[5]));
}

#[test]
fn test_widened_segment_invalidates_decision_outside_accessed_range() {
    let temp_dir = TempDir::new().unwrap();
    let config = PlacementConfig::builder()
        .data_dir(temp_dir.path())
        .target_len(1)
        .boiling_point(10)
        .freezing_point(3)
        .build();
    let (mgr, _rx) = PlacementManager::with_channel(config, Arc::new(BytewiseComparator)).unwrap();
    mgr.record_access(&[0], &[10], 2).unwrap();
    mgr.record_access(&[1], &[2], 4).unwrap();
    assert!(!mgr.should_store_in_fast_tier(&[1]));
    assert_eq!(mgr.cache().lookup(&[2]), Some(false));

    // over target length: [0, 10] grows to [0, 12] and boils
    mgr.record_access(&[5], &[12], 8).unwrap();

    assert!(!mgr.cache().is_valid());
    assert!(mgr.should_store_in_fast_tier(&[1]));
}

#[test]
fn test_versioned_keys_share_a_range() {
    let temp_dir = TempDir::new().unwrap();
    let comparator: Arc<dyn KeyComparator> = Arc::new(PureKeyComparator::default());
    let (mgr, _rx) = PlacementManager::with_channel(config(&temp_dir), comparator).unwrap();

    let versioned = |user_key: &[u8], ts: u64| {
        let mut key = user_key.to_vec();
        key.extend_from_slice(&ts.to_be_bytes());
        key
    };

    mgr.record_access(&versioned(b"user10", 7), &versioned(b"user20", 7), 12)
        .unwrap();

    assert!(mgr.should_store_in_fast_tier(&versioned(b"user15", 99)));
    assert!(mgr.should_store_in_fast_tier(&versioned(b"user20", 1)));
    assert!(!mgr.should_store_in_fast_tier(&versioned(b"user30", 1)));
}

// =============================================================================
// Move Command Tests
// =============================================================================

#[test]
fn test_promotion_command_on_crossing() {
    let temp_dir = TempDir::new().unwrap();
    let (mgr, rx) = manager(&temp_dir);

    mgr.record_access(&[10], &[20], 5).unwrap();
    assert!(rx.try_recv().is_err());

    mgr.record_access(&[10], &[20], 5).unwrap();
    assert_eq!(rx.try_recv().unwrap(), command(&[10], &[20], true));

    mgr.record_access(&[10], &[20], 5).unwrap();
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_command_uses_ordered_endpoints() {
    let temp_dir = TempDir::new().unwrap();
    let (mgr, rx) = manager(&temp_dir);

    mgr.record_access(&[20], &[10], 12).unwrap();

    assert_eq!(drain(&rx), vec![command(&[10], &[20], true)]);
}

#[test]
fn test_demotion_command_on_crossing() {
    let temp_dir = TempDir::new().unwrap();
    let (mgr, rx) = manager(&temp_dir);
    mgr.record_access(&[10], &[20], 12).unwrap();
    drain(&rx);

    assert_eq!(mgr.set_tier_flag(&[10], &[20], true), 1);
    mgr.record_access(&[10], &[20], -10).unwrap();

    assert_eq!(drain(&rx), vec![command(&[10], &[20], false)]);
}

#[test]
fn test_rejected_access_emits_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let (mgr, rx) = manager(&temp_dir);

    let result = mgr.record_access(&[10], &[20], -4);

    assert!(matches!(result, Err(HeatError::Invariant(_))));
    assert!(drain(&rx).is_empty());
    assert!(mgr.table().is_empty());
}

#[test]
fn test_set_tier_flag_counts_contained_segments() {
    let temp_dir = TempDir::new().unwrap();
    let (mgr, _rx) = manager(&temp_dir);
    mgr.record_access(&[10], &[19], 2).unwrap();
    mgr.record_access(&[20], &[29], 2).unwrap();
    mgr.record_access(&[25], &[40], 2).unwrap();

    assert_eq!(mgr.set_tier_flag(&[30], &[10], true), 2);
    assert!(mgr.table().find_seg(&[12]).unwrap().in_fast_tier);
    assert!(!mgr.table().find_seg(&[35]).unwrap().in_fast_tier);
}

#[test]
fn test_full_queue_drops_commands() {
    let temp_dir = TempDir::new().unwrap();
    let config = PlacementConfig {
        move_queue_capacity: 1,
        ..config(&temp_dir)
    };
    let (mgr, rx) = PlacementManager::with_channel(config, Arc::new(BytewiseComparator)).unwrap();

    mgr.record_access(&[10], &[19], 12).unwrap();
    mgr.record_access(&[30], &[39], 12).unwrap();

    assert_eq!(drain(&rx), vec![command(&[10], &[19], true)]);
    // the table still tracks both ranges
    assert_eq!(mgr.table().len(), 2);
}

#[test]
fn test_flush_pending() {
    let temp_dir = TempDir::new().unwrap();
    let (mgr, rx) = manager(&temp_dir);
    mgr.record_access(&[10], &[19], 12).unwrap();
    mgr.record_access(&[30], &[39], 2).unwrap();
    mgr.set_tier_flag(&[30], &[39], true);
    // the promotion issued above was lost by the engine
    drain(&rx);

    assert_eq!(mgr.flush_pending(), 2);
    assert_eq!(
        drain(&rx),
        vec![command(&[30], &[39], false), command(&[10], &[19], true)]
    );
}

// =============================================================================
// Cooling Tests
// =============================================================================

#[test]
fn test_cool_tick_runs_every_period() {
    let temp_dir = TempDir::new().unwrap();
    let (mgr, rx) = manager(&temp_dir);
    mgr.record_access(&[10], &[19], 12).unwrap();
    mgr.set_tier_flag(&[10], &[19], true);
    drain(&rx);

    // 12 -> 6: still above the freezing point
    assert!(!mgr.trigger_cool_tick().unwrap());
    assert!(!mgr.trigger_cool_tick().unwrap());
    assert!(mgr.trigger_cool_tick().unwrap());
    assert_eq!(mgr.table().find_seg(&[15]).unwrap().heat, 6);
    assert!(drain(&rx).is_empty());

    // 6 -> 3: frozen
    assert!(!mgr.trigger_cool_tick().unwrap());
    assert!(!mgr.trigger_cool_tick().unwrap());
    assert!(mgr.trigger_cool_tick().unwrap());
    assert_eq!(drain(&rx), vec![command(&[10], &[19], false)]);
}

#[test]
fn test_cool_clears_cache() {
    let temp_dir = TempDir::new().unwrap();
    let (mgr, _rx) = manager(&temp_dir);
    mgr.record_access(&[10], &[19], 12).unwrap();
    assert!(mgr.should_store_in_fast_tier(&[15]));

    mgr.cool(0.5).unwrap();

    assert!(!mgr.cache().is_valid());
    assert!(!mgr.should_store_in_fast_tier(&[15]));
}

#[test]
fn test_cool_rejects_bad_factor() {
    let temp_dir = TempDir::new().unwrap();
    let (mgr, _rx) = manager(&temp_dir);

    assert!(matches!(mgr.cool(1.0), Err(HeatError::Invariant(_))));
    assert!(matches!(mgr.cool(0.0), Err(HeatError::Invariant(_))));
}

// =============================================================================
// Checkpoint Tests
// =============================================================================

#[test]
fn test_save_and_open() {
    let temp_dir = TempDir::new().unwrap();
    {
        let (mgr, _rx) = manager(&temp_dir);
        mgr.record_access(&[10], &[19], 12).unwrap();
        mgr.record_access(&[30], &[39], 4).unwrap();
        mgr.set_tier_flag(&[10], &[19], true);
        assert_eq!(mgr.save_state().unwrap(), 2);
        assert!(mgr.table_path().exists());
    }

    let (tx, _rx) = crossbeam::channel::unbounded::<MoveCommand>();
    let mgr = PlacementManager::open(config(&temp_dir), Arc::new(BytewiseComparator), Arc::new(tx))
        .unwrap();

    assert_eq!(mgr.table().len(), 2);
    let hit = mgr.table().find_seg(&[15]).unwrap();
    assert_eq!(hit.heat, 12);
    assert!(hit.in_fast_tier);
    assert!(mgr.should_store_in_fast_tier(&[15]));
}

#[test]
fn test_open_without_saved_table() {
    let temp_dir = TempDir::new().unwrap();
    let (tx, _rx) = crossbeam::channel::unbounded::<MoveCommand>();

    let mgr = PlacementManager::open(config(&temp_dir), Arc::new(BytewiseComparator), Arc::new(tx))
        .unwrap();

    assert!(mgr.table().is_empty());
}

#[test]
fn test_save_state_creates_data_dir() {
    let temp_dir = TempDir::new().unwrap();
    let config = PlacementConfig {
        data_dir: temp_dir.path().join("nested").join("dir"),
        ..config(&temp_dir)
    };
    let (mgr, _rx) = PlacementManager::with_channel(config, Arc::new(BytewiseComparator)).unwrap();
    mgr.record_access(&[1], &[2], 3).unwrap();

    mgr.save_state().unwrap();

    assert!(mgr.table_path().exists());
}

#[test]
fn test_load_state_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let (mgr, _rx) = manager(&temp_dir);

    assert!(matches!(mgr.load_state(), Err(HeatError::Io(_))));
}

#[test]
fn test_load_state_clears_cache() {
    let temp_dir = TempDir::new().unwrap();
    let (mgr, _rx) = manager(&temp_dir);
    mgr.save_state().unwrap();
    mgr.record_access(&[10], &[19], 12).unwrap();
    assert!(mgr.should_store_in_fast_tier(&[15]));

    assert_eq!(mgr.load_state().unwrap(), 0);

    assert!(!mgr.cache().is_valid());
    assert!(!mgr.should_store_in_fast_tier(&[15]));
}

// =============================================================================
// Config Tests
// =============================================================================

#[test]
fn test_invalid_config_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let base = config(&temp_dir);
    let invalid = vec![
        PlacementConfig { target_len: 0, ..base.clone() },
        PlacementConfig { boiling_point: 2, ..base.clone() },
        PlacementConfig { boiling_point: 251, ..base.clone() },
        PlacementConfig { freezing_point: -1, ..base.clone() },
        PlacementConfig { cooling_period: 0, ..base.clone() },
        PlacementConfig { cooling_factor: 1.0, ..base.clone() },
        PlacementConfig { cooling_factor: 0.0, ..base.clone() },
        PlacementConfig { move_queue_capacity: 0, ..base.clone() },
    ];

    for config in invalid {
        let result = PlacementManager::with_channel(config.clone(), Arc::new(BytewiseComparator));
        assert!(
            matches!(result, Err(HeatError::Config(_))),
            "accepted {:?}",
            config
        );
    }
}

#[test]
fn test_default_config_is_valid() {
    assert!(PlacementConfig::default().validate().is_ok());
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_record_access() {
    let temp_dir = TempDir::new().unwrap();
    let (mgr, rx) = manager(&temp_dir);
    let mgr = Arc::new(mgr);

    let handles: Vec<_> = (0..8u8)
        .map(|i| {
            let mgr = Arc::clone(&mgr);
            thread::spawn(move || {
                for _ in 0..20 {
                    mgr.record_access(&[i * 10], &[i * 10 + 5], 1).unwrap();
                    mgr.should_store_in_fast_tier(&[i * 10 + 2]);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let commands = drain(&rx);
    assert_eq!(commands.len(), 8);
    assert!(commands.iter().all(|c| c.to_fast_tier));
    for i in 0..8u8 {
        assert_eq!(mgr.table().find_seg(&[i * 10]).unwrap().heat, 20);
        assert!(mgr.should_store_in_fast_tier(&[i * 10 + 3]));
    }
}

#[test]
fn test_migration_lifecycle() {
    let temp_dir = TempDir::new().unwrap();
    let (mgr, rx) = manager(&temp_dir);

    // engine worker: apply each command, then confirm it
    let apply = |mgr: &PlacementManager| {
        for cmd in rx.try_iter() {
            mgr.set_tier_flag(&cmd.start, &cmd.end, cmd.to_fast_tier);
        }
    };

    for _ in 0..12 {
        mgr.record_access(b"a", b"m", 1).unwrap();
    }
    apply(&mgr);
    assert!(mgr.table().find_seg(b"c").unwrap().in_fast_tier);

    // 12 -> 6 -> 3
    mgr.cool(0.5).unwrap();
    mgr.cool(0.5).unwrap();
    apply(&mgr);
    assert!(!mgr.table().find_seg(b"c").unwrap().in_fast_tier);
    assert!(mgr.table().pending_migrations().is_empty());

    mgr.save_state().unwrap();
    let (tx, _rx2) = crossbeam::channel::unbounded::<MoveCommand>();
    let reopened =
        PlacementManager::open(config(&temp_dir), Arc::new(BytewiseComparator), Arc::new(tx)).unwrap();
    assert_eq!(reopened.table().snapshot(), mgr.table().snapshot());
}
