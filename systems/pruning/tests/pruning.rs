use std::collections::BTreeSet;

use se_maintenance_core::{Command, FactionId, PlayerId, RemovalReason};
use se_maintenance_system_clustering::{ClusterScan, SingletonResolver};
use se_maintenance_system_ownership::{FrozenLedger, OwnershipLedger};
use se_maintenance_system_pruning::{FactionPruner, PlayerPruner};
use se_maintenance_world::{
    self as world,
    fixtures::{self, faction, player, BlockBuilder, CheckpointBuilder, GridBuilder, SectorBuilder},
    query, World,
};

fn build_world() -> World {
    let sector = SectorBuilder::new()
        .grid(GridBuilder::new(1).block(BlockBuilder::reactor(1).owner(1)))
        .grid(GridBuilder::new(2).block(BlockBuilder::armor().owner(4)));
    let checkpoint = CheckpointBuilder::new()
        // owns a reactor
        .player(1, "Tess", true)
        // dead, owns nothing, only member of faction 100
        .player(2, "Orin", true)
        // alive, owns nothing, member of faction 200
        .player(3, "Mara", false)
        // alive, owns armor, no faction
        .player(4, "Jun", false)
        // alive, owns nothing, no faction, asked to join 200
        .player(5, "Pell", false)
        .faction(100, "ORN", &[2], &[])
        .faction(200, "MAR", &[3], &[5])
        .faction(300, "OLD", &[], &[])
        .relation(100, 200)
        .relation(200, 300)
        .request(200, &[100, 300])
        .request(100, &[200]);
    fixtures::world(sector, checkpoint).expect("fixture world is valid")
}

fn ledger(world: &World) -> FrozenLedger {
    let sector = query::sector(world);
    let mut ledger = OwnershipLedger::new();
    for cluster in ClusterScan::new(sector, &SingletonResolver) {
        ledger.absorb(OwnershipLedger::record_owners(&cluster, sector));
    }
    ledger.freeze()
}

fn apply_all(world: &mut World, commands: Vec<Command>) {
    let mut events = Vec::new();
    for command in commands {
        world::apply(world, command, &mut events);
    }
}

#[test]
fn players_are_marked_only_when_abandoned() {
    let world = build_world();
    let marked = PlayerPruner.mark(query::checkpoint(&world), &ledger(&world));

    let ids: Vec<_> = marked.keys().copied().collect();
    assert_eq!(ids, vec![player(2), player(5)]);
    assert_eq!(
        marked[&player(2)],
        RemovalReason::PlayerAbandoned {
            dead: true,
            factionless: false
        }
    );
    assert_eq!(
        marked[&player(5)],
        RemovalReason::PlayerAbandoned {
            dead: false,
            factionless: true
        }
    );
}

#[test]
fn dead_member_removal_cascades_into_faction_removal() {
    let mut world = build_world();
    let frozen = ledger(&world);

    let marked = PlayerPruner.mark(query::checkpoint(&world), &frozen);
    let mut commands = Vec::new();
    PlayerPruner.sweep(query::checkpoint(&world), &marked, &mut commands);
    assert!(commands.contains(&Command::RemoveFactionMember {
        faction: faction(100),
        player: player(2),
    }));
    assert!(commands.contains(&Command::RemoveJoinRequest {
        faction: faction(200),
        player: player(5),
    }));
    apply_all(&mut world, commands);

    let checkpoint = query::checkpoint(&world);
    assert!(checkpoint.players().iter().all(|record| record.id() != player(2)));
    assert!(checkpoint.directory().iter().all(|entry| entry.player() != Some(player(2))));
    assert!(checkpoint.faction_players().iter().all(|entry| entry.player() != player(2)));
    assert_eq!(
        query::factions(&world).len(),
        3,
        "emptied factions survive the player sweep"
    );

    let removed: BTreeSet<PlayerId> = marked.keys().copied().collect();
    let empty = FactionPruner.mark(query::checkpoint(&world), &removed);
    assert_eq!(empty, BTreeSet::from([faction(100), faction(300)]));

    let mut commands = Vec::new();
    FactionPruner.sweep(query::checkpoint(&world), &empty, &mut commands);
    apply_all(&mut world, commands);

    let remaining: Vec<FactionId> = query::factions(&world).iter().map(|f| f.id()).collect();
    assert_eq!(remaining, vec![faction(200)]);
    assert!(query::relations(&world).is_empty(), "relations naming removed factions are gone");
    let requests = query::requests(&world);
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].owner(), faction(200));
    assert_eq!(requests[0].targets().count(), 0);
}

#[test]
fn faction_marking_matches_between_dry_and_live_runs() {
    let live = {
        let mut world = build_world();
        let marked = PlayerPruner.mark(query::checkpoint(&world), &ledger(&world));
        let mut commands = Vec::new();
        PlayerPruner.sweep(query::checkpoint(&world), &marked, &mut commands);
        apply_all(&mut world, commands);
        let removed = marked.keys().copied().collect();
        FactionPruner.mark(query::checkpoint(&world), &removed)
    };
    let dry = {
        let world = build_world();
        let marked = PlayerPruner.mark(query::checkpoint(&world), &ledger(&world));
        let removed = marked.keys().copied().collect();
        FactionPruner.mark(query::checkpoint(&world), &removed)
    };
    assert_eq!(live, dry);
}

#[test]
fn relations_are_removed_once_per_pair() {
    let world = fixtures::world(
        SectorBuilder::new(),
        CheckpointBuilder::new()
            .faction(1, "A", &[], &[])
            .faction(2, "B", &[], &[])
            .relation(1, 2)
            .relation(2, 1),
    )
    .expect("fixture world is valid");
    let marked = BTreeSet::from([faction(1), faction(2)]);
    let mut commands = Vec::new();
    FactionPruner.sweep(query::checkpoint(&world), &marked, &mut commands);
    let relations = commands
        .iter()
        .filter(|command| matches!(command, Command::RemoveRelation { .. }))
        .count();
    assert_eq!(relations, 1);
}

#[test]
fn every_request_entry_of_an_owner_drops_the_removed_target() {
    let mut world = fixtures::world(
        SectorBuilder::new(),
        CheckpointBuilder::new()
            .faction(1, "A", &[], &[])
            .faction(2, "B", &[7], &[])
            .request(2, &[1])
            .request(2, &[1, 3])
            .request(1, &[2])
            .request(1, &[2]),
    )
    .expect("fixture world is valid");
    let marked = FactionPruner.mark(query::checkpoint(&world), &BTreeSet::new());
    assert_eq!(marked, BTreeSet::from([faction(1)]));

    let mut commands = Vec::new();
    FactionPruner.sweep(query::checkpoint(&world), &marked, &mut commands);
    assert_eq!(
        commands,
        vec![
            Command::RemoveFaction {
                faction: faction(1),
                reason: RemovalReason::FactionEmpty,
            },
            Command::RemoveRequestTarget {
                owner: faction(2),
                target: faction(1),
            },
            Command::RemoveRequestEntry { owner: faction(1) },
        ]
    );
    apply_all(&mut world, commands);

    let targets: Vec<Vec<FactionId>> = query::requests(&world)
        .iter()
        .map(|entry| {
            assert_eq!(entry.owner(), faction(2));
            entry.targets().collect()
        })
        .collect();
    assert_eq!(targets, vec![vec![], vec![FactionId::new(3)]]);

    let mut replay = Vec::new();
    let marked = FactionPruner.mark(query::checkpoint(&world), &BTreeSet::new());
    FactionPruner.sweep(query::checkpoint(&world), &marked, &mut replay);
    assert!(replay.is_empty(), "unexpected commands: {replay:?}");
}

#[test]
fn no_dangling_references_after_both_passes() {
    let mut world = build_world();
    let frozen = ledger(&world);
    let marked = PlayerPruner.mark(query::checkpoint(&world), &frozen);
    let mut commands = Vec::new();
    PlayerPruner.sweep(query::checkpoint(&world), &marked, &mut commands);
    apply_all(&mut world, commands);

    let removed_players: BTreeSet<PlayerId> = marked.keys().copied().collect();
    let removed_factions = FactionPruner.mark(query::checkpoint(&world), &removed_players);
    let mut commands = Vec::new();
    FactionPruner.sweep(query::checkpoint(&world), &removed_factions, &mut commands);
    apply_all(&mut world, commands);

    for faction in query::factions(&world) {
        assert!(!removed_factions.contains(&faction.id()));
        assert!(!faction.members().is_empty(), "no empty faction survives");
        for member in faction.members().iter().chain(faction.join_requests()) {
            assert!(!removed_players.contains(&member.player()));
        }
    }
    for entry in query::faction_players(&world) {
        assert!(!removed_players.contains(&entry.player()));
    }
    for relation in query::relations(&world) {
        assert!(!removed_factions.contains(&relation.first()));
        assert!(!removed_factions.contains(&relation.second()));
    }
    for entry in query::requests(&world) {
        assert!(!removed_factions.contains(&entry.owner()));
        assert!(entry.targets().all(|target| !removed_factions.contains(&target)));
    }
}
