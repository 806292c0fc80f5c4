//! End-to-end scenarios driven through the public tick loop.

use critter_core::config::SimConfig;
use critter_core::entities::{DeathCause, EntityHandle};
use critter_core::events::SimEvent;
use critter_core::mission::{Mission, MissionKind};
use critter_core::simulation::{tick_seconds, SpawnRequest};
use critter_test_utils::fixtures::{
    alliance_scenario, even_temperament, feeding_scenario, fixed, fixed_f, priority_scenario,
    quiet_config, run_seconds, scripted_pen, spawn_founder, starving_scenario, vec2, BLUE, RED,
};

#[test]
fn test_feeding_resets_hunger_in_same_tick() {
    let mut s = feeding_scenario();
    let events = s.sim.tick(tick_seconds());

    let agent = s.sim.agent(s.agent).unwrap();
    assert_eq!(agent.hunger, fixed(0));
    assert_eq!(agent.hunger_time, fixed(0));
    assert_eq!(agent.stats.foods, 1);
    assert!(s.sim.food(s.food).is_none());
    assert!(events
        .events
        .iter()
        .any(|e| matches!(e, SimEvent::Ate { agent, .. } if *agent == s.agent)));
}

#[test]
fn test_starvation_death_lands_in_ledger() {
    let (mut sim, agent) = starving_scenario();
    run_seconds(&mut sim, 11);

    assert!(sim.agent(agent).is_none());
    assert_eq!(sim.ledger().len(), 1);
    let record = sim.ledger().find("Ce").next().unwrap();
    assert_eq!(record.cause, DeathCause::Starvation);
    assert_eq!(sim.query(critter_core::entities::EntityTag::Corpse).len(), 1);
}

#[test]
fn test_low_health_flees_before_eating() {
    let (mut sim, wounded, enemy) = priority_scenario();
    sim.tick(tick_seconds());

    let mission = sim.agent(wounded).unwrap().mission.mission;
    assert_eq!(mission.kind(), MissionKind::Flee);
    assert_eq!(mission, Mission::Flee { threat: Some(enemy) });
}

#[test]
fn test_compatible_neighbours_become_kin() {
    let (mut sim, a, b) = alliance_scenario();
    assert!(!sim.are_kin(a, b));

    run_seconds(&mut sim, 6);

    assert!(sim.are_kin(a, b));
    assert!(sim.are_kin(b, a));
    assert_eq!(sim.alliances().len(), 1);
    assert!(sim.news().iter().any(|line| line.text.contains("allied")));
}

#[test]
fn test_newborn_inherits_family_and_lineage() {
    let mut sim = scripted_pen(quiet_config(), fixed_f(0.99));
    let parent = spawn_founder(&mut sim, "Jo", vec2(300, 300), RED, even_temperament());

    let mut child = None;
    for _ in 0..20 * 12 {
        let events = sim.tick(tick_seconds());
        if let Some(id) = events.births().next() {
            child = Some(id);
            break;
        };
    }

    let child = sim.agent(child.expect("a child is born once sated")).unwrap();
    let parent = sim.agent(parent).unwrap();
    assert_eq!(child.family, parent.family);
    assert_eq!(child.last_name.as_deref(), Some("Joz"));
    assert_eq!(child.lineage.first().map(String::as_str), Some("Jo"));
    assert_eq!(child.lineage.last(), Some(&child.name));
    assert_eq!(parent.stats.kids, 1);
    assert_eq!(parent.offspring, vec![child.name.clone()]);
}

#[test]
fn test_full_pen_defers_birth_until_a_slot_frees() {
    let config = SimConfig {
        max_population: 2,
        ..quiet_config()
    };
    let mut sim = scripted_pen(config, fixed_f(0.99));
    let parent = spawn_founder(&mut sim, "Jo", vec2(300, 300), RED, even_temperament());
    let other = spawn_founder(&mut sim, "Ri", vec2(600, 400), RED, even_temperament());
    {
        let p = sim.agent_mut(parent).unwrap();
        p.ready_to_birth = true;
        p.hunger = fixed(1);
    }

    for _ in 0..10 {
        let events = sim.tick(tick_seconds());
        assert_eq!(events.births().count(), 0);
        let p = sim.agent(parent).unwrap();
        assert!(p.ready_to_birth);
        assert_eq!(p.sated_time, fixed(0));
        assert_eq!(sim.population(), 2);
    }

    sim.destroy(EntityHandle::Agent(other)).unwrap();
    let events = sim.tick(tick_seconds());

    assert_eq!(events.births().count(), 1);
    let p = sim.agent(parent).unwrap();
    assert!(!p.ready_to_birth);
    assert_eq!(p.stats.kids, 1);
    assert_eq!(sim.population(), 2);
}

#[test]
fn test_rival_tears_down_legacy() {
    let mut sim = scripted_pen(quiet_config(), fixed(0));
    let owner = spawn_founder(&mut sim, "Ka", vec2(200, 200), RED, even_temperament());
    sim.spawn(SpawnRequest::Legacy { owner }).unwrap();
    sim.agent_mut(owner).unwrap().position = vec2(650, 450);
    spawn_founder(&mut sim, "Lu", vec2(225, 205), BLUE, even_temperament());

    let mut demolished = false;
    for _ in 0..20 {
        let events = sim.tick(tick_seconds());
        demolished |= events
            .events
            .iter()
            .any(|e| matches!(e, SimEvent::LegacyDemolished { .. }));
    }

    assert!(demolished);
    assert!(sim.query(critter_core::entities::EntityTag::Legacy).is_empty());
    assert!(sim.agent(owner).unwrap().legacy_markers.is_empty());
}

#[test]
fn test_kin_leave_legacy_standing() {
    let mut sim = scripted_pen(quiet_config(), fixed(0));
    let owner = spawn_founder(&mut sim, "Ma", vec2(200, 200), RED, even_temperament());
    sim.spawn(SpawnRequest::Legacy { owner }).unwrap();
    sim.agent_mut(owner).unwrap().position = vec2(650, 450);
    spawn_founder(&mut sim, "Ne", vec2(225, 205), RED, even_temperament());

    run_seconds(&mut sim, 1);

    assert_eq!(sim.query(critter_core::entities::EntityTag::Legacy).len(), 1);
}

#[test]
fn test_dead_owner_takes_markers_along() {
    let mut sim = scripted_pen(quiet_config(), fixed_f(0.99));
    let owner = spawn_founder(&mut sim, "Pi", vec2(200, 200), RED, even_temperament());
    sim.spawn(SpawnRequest::Legacy { owner }).unwrap();
    assert_eq!(sim.query(critter_core::entities::EntityTag::Legacy).len(), 1);

    sim.destroy(critter_core::entities::EntityHandle::Agent(owner))
        .unwrap();

    assert!(sim.query(critter_core::entities::EntityTag::Legacy).is_empty());
    assert_eq!(sim.ledger().records()[0].cause, DeathCause::Removed);
}
