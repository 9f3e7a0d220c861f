//! Integration tests for group routing, collectors and named indices.

use std::cell::RefCell;
use std::rc::Rc;

use cohort_core::{
    Context, GroupEventKind, GroupTrigger, Matcher, MultiEntityIndex, Owner, PrimaryEntityIndex,
};

const POSITION: usize = 0;
const VELOCITY: usize = 1;
const FROZEN: usize = 2;
const TEAM: usize = 3;

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Position(i32);

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Velocity(i32);

#[derive(Debug, Default)]
struct Frozen;

#[derive(Debug, PartialEq)]
struct Team(&'static str);

#[test]
fn test_movement_system_over_group() {
    let mut ctx = Context::new(4, 0, None).unwrap();
    let movers = ctx
        .get_group(Matcher::all_of([POSITION, VELOCITY]).none_of([FROZEN]))
        .unwrap();

    let mut entities = Vec::new();
    for i in 0..10 {
        let e = ctx.create_entity();
        ctx.add_component(e, POSITION, Box::new(Position(0))).unwrap();
        if i % 2 == 0 {
            ctx.add_component(e, VELOCITY, Box::new(Velocity(i))).unwrap();
        }
        entities.push(e);
    }
    ctx.add_component(entities[4], FROZEN, Box::new(Frozen)).unwrap();
    assert_eq!(ctx.group(movers).unwrap().count(), 4);

    let members = ctx.group(movers).unwrap().entities();
    for e in members {
        let p = *ctx.get_component_as::<Position>(e, POSITION).unwrap();
        let v = *ctx.get_component_as::<Velocity>(e, VELOCITY).unwrap();
        ctx.replace_component(e, POSITION, Box::new(Position(p.0 + v.0))).unwrap();
    }

    assert_eq!(ctx.get_component_as::<Position>(entities[8], POSITION).unwrap(), &Position(8));
    assert_eq!(ctx.get_component_as::<Position>(entities[4], POSITION).unwrap(), &Position(0));

    ctx.remove_component(entities[4], FROZEN).unwrap();
    assert!(ctx.group(movers).unwrap().contains(entities[4]));
}

#[test]
fn test_groups_are_shared_across_callers() {
    let mut ctx = Context::new(4, 0, None).unwrap();
    let a = ctx
        .get_group(Matcher::all_of([VELOCITY, POSITION]).none_of([FROZEN]))
        .unwrap();
    let b = ctx
        .get_group(Matcher::all_of([POSITION, VELOCITY]).none_of([FROZEN, FROZEN]))
        .unwrap();
    let c = ctx.get_group(Matcher::all_of([POSITION, VELOCITY])).unwrap();

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(ctx.groups().len(), 2);
}

#[test]
fn test_untouched_slots_never_notify() {
    let mut ctx = Context::new(4, 0, None).unwrap();
    let teams = ctx.get_group(Matcher::all_of([TEAM])).unwrap();
    let frozen = ctx.get_group(Matcher::all_of([FROZEN])).unwrap();

    let log = Rc::new(RefCell::new(Vec::new()));
    for group in [teams, frozen] {
        let sink = Rc::clone(&log);
        ctx.subscribe_group(group, move |_, event| sink.borrow_mut().push(event.group))
            .unwrap();
    }

    let e = ctx.create_entity();
    ctx.add_component(e, TEAM, Box::new(Team("red"))).unwrap();
    ctx.replace_component(e, TEAM, Box::new(Team("blue"))).unwrap();
    ctx.add_component(e, POSITION, Box::new(Position(1))).unwrap();

    assert_eq!(*log.borrow(), vec![teams, teams]);
}

#[test]
fn test_reactive_collector_drives_a_system() {
    let mut ctx = Context::new(4, 0, None).unwrap();
    let positioned = ctx.get_group(Matcher::all_of([POSITION])).unwrap();
    let moved = ctx
        .create_collector(&[(positioned, GroupTrigger::Added)])
        .unwrap();

    let first = ctx.create_entity();
    let second = ctx.create_entity();
    ctx.add_component(first, POSITION, Box::new(Position(0))).unwrap();
    ctx.add_component(second, POSITION, Box::new(Position(0))).unwrap();
    // Updates do not re-trigger an Added collector.
    ctx.replace_component(first, POSITION, Box::new(Position(3))).unwrap();

    let batch = ctx.collected(moved).unwrap();
    assert_eq!(batch, vec![first, second]);
    ctx.clear_collected(moved).unwrap();
    assert_eq!(ctx.collected_count(moved).unwrap(), 0);
    assert!(!ctx.is_retained_by(first, Owner::Collector(moved)).unwrap());
}

#[test]
fn test_indices_track_group_membership() {
    let mut ctx = Context::new(4, 0, None).unwrap();
    let players = ctx.get_group(Matcher::all_of([TEAM, POSITION])).unwrap();

    let red = ctx.create_entity();
    ctx.add_component(red, TEAM, Box::new(Team("red"))).unwrap();
    ctx.add_component(red, POSITION, Box::new(Position(1))).unwrap();

    ctx.add_entity_index(Box::new(MultiEntityIndex::new("by_team", players, TEAM, |t: &Team| t.0)))
        .unwrap();
    ctx.add_entity_index(Box::new(PrimaryEntityIndex::new(
        "by_position",
        players,
        POSITION,
        |p: &Position| p.0,
    )))
    .unwrap();

    let blue = ctx.create_entity();
    ctx.add_component(blue, POSITION, Box::new(Position(2))).unwrap();
    ctx.add_component(blue, TEAM, Box::new(Team("blue"))).unwrap();

    let by_team = ctx
        .get_entity_index_as::<MultiEntityIndex<Team, &'static str>>("by_team")
        .unwrap();
    assert_eq!(by_team.get_entities(&"red").collect::<Vec<_>>(), vec![red]);
    assert_eq!(by_team.count(&"blue"), 1);

    ctx.replace_component(blue, POSITION, Box::new(Position(5))).unwrap();
    let by_position = ctx
        .get_entity_index_as::<PrimaryEntityIndex<Position, i32>>("by_position")
        .unwrap();
    assert_eq!(by_position.get_entity(&2), None);
    assert_eq!(by_position.get_entity(&5), Some(blue));

    ctx.remove_component(red, TEAM).unwrap();
    let by_position = ctx
        .get_entity_index_as::<PrimaryEntityIndex<Position, i32>>("by_position")
        .unwrap();
    assert_eq!(by_position.get_entity(&1), None);
    assert_eq!(by_position.len(), 1);
}

#[test]
fn test_listener_sees_removal_previous_value() {
    let mut ctx = Context::new(4, 0, None).unwrap();
    let moving = ctx.get_group(Matcher::all_of([VELOCITY])).unwrap();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    ctx.subscribe_group(moving, move |_, event| {
        if event.kind == GroupEventKind::Removed {
            let last = event.previous.and_then(|c| c.downcast_ref::<Velocity>()).copied();
            sink.borrow_mut().push(last);
        }
    })
    .unwrap();

    let e = ctx.create_entity();
    ctx.add_component(e, VELOCITY, Box::new(Velocity(7))).unwrap();
    ctx.destroy_entity(e).unwrap();

    assert_eq!(*seen.borrow(), vec![Some(Velocity(7))]);
}
