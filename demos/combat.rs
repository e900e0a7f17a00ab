//! Combat example: a scripted duel driven by ticks
//!
//! This example demonstrates:
//! - Subscribing to HP and reacting to death with `clean_target`
//! - Damage as negative HP statuses
//! - A shield bound to an effect that is raised and lowered with its status
//! - Running with a tracing subscriber (`RUST_LOG=statusfx=debug`)

use statusfx::*;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Kind {
    Atk,
    Hp,
    Def,
}

struct Fighter {
    name: &'static str,
    token: SubjectToken,
    dead: Rc<Cell<bool>>,
}

fn spawn(
    scope: &StatusScope<Status<Kind>>,
    name: &'static str,
    hp: f32,
    atk: f32,
) -> Result<Fighter, StatusError> {
    let token = SubjectToken::generate();
    let dead = Rc::new(Cell::new(false));

    scope.apply(token, Status::new(Kind::Hp, hp))?;
    scope.apply(token, Status::new(Kind::Atk, atk))?;

    let weak = scope.downgrade();
    let is_dead = Rc::clone(&dead);
    scope.subscribe(
        token,
        Kind::Hp,
        move |value| {
            if value > 0.0 {
                println!("  {name} HP: {value}");
                return;
            }
            if is_dead.replace(true) {
                return;
            }
            println!("  {name} has fallen");
            if let Some(scope) = weak.upgrade() {
                if let Err(err) = scope.clean_target(token) {
                    eprintln!("  failed to clean up {name}: {err}");
                }
            }
        },
        false,
    )?;
    scope.subscribe(
        token,
        Kind::Atk,
        move |value| println!("  {name} ATK: {value}"),
        false,
    )?;

    Ok(Fighter { name, token, dead })
}

fn main() -> Result<(), StatusError> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("failed to install subscriber");

    let system = StatusSystem::<Status<Kind>>::new();
    let scope = system.create_scope();

    let player = spawn(&scope, "Player", 100.0, 20.0)?;
    let monster = spawn(&scope, "Monster", 150.0, 5.0)?;

    let shield_log = Rc::new(RefCell::new(Vec::new()));
    let mut shield = EntityToken::NONE;

    let frame = Duration::from_millis(100);
    let mut now = Duration::ZERO;

    for round in 0..12 {
        now += frame;
        println!("\n=== Round {round} ({:.1}s) ===", now.as_secs_f32());
        scope.update(now)?;

        // The player strikes every round.
        if !monster.dead.get() {
            let atk = scope.get_status_value(player.token, Kind::Atk)?;
            println!("  {} strikes {} for {atk}", player.name, monster.name);
            scope.apply(monster.token, Status::new(Kind::Hp, -atk))?;
        }

        // The shield goes up on round 2 and drops on round 5.
        if round == 2 {
            shield = scope.apply(player.token, Status::new(Kind::Def, 10.0))?;
            let weak = scope.downgrade();
            let log = Rc::clone(&shield_log);
            let owner = player.token;
            scope.subscribe_effect(shield, move || {
                let def = weak
                    .upgrade()
                    .and_then(|scope| scope.get_status_value(owner, Kind::Def).ok())
                    .unwrap_or(0.0);
                println!("  shield raised (Def: {def})");
                log.borrow_mut().push(def);
                || println!("  shield lowered")
            })?;
        } else if round == 5 {
            scope.remove_by_entity_token(shield)?;
        }
    }

    println!("\n=== Final ===");
    for fighter in [&player, &monster] {
        println!(
            "{}: HP {} ATK {} ({})",
            fighter.name,
            scope.get_status_value(fighter.token, Kind::Hp)?,
            scope.get_status_value(fighter.token, Kind::Atk)?,
            if fighter.dead.get() { "dead" } else { "alive" }
        );
    }
    println!("Shield raised {} time(s)", shield_log.borrow().len());

    scope.dispose();
    Ok(())
}
