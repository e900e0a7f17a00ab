//! Basic example: Applying, aggregating and removing statuses
//!
//! This example demonstrates:
//! - Applying statuses (they are summed per subject and kind)
//! - Committing them with a tick
//! - Timed statuses and tag-based removal
//! - Reading a derived value through a modifier

use statusfx::*;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Kind {
    Hp,
    Vitality,
}

fn main() -> Result<(), StatusError> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("failed to install subscriber");

    let system = StatusSystem::<Status<Kind>>::new();
    let scope = system.create_scope();
    let hero = SubjectToken::generate();
    let equipment = Tag::generate();

    // Queue statuses (nothing is visible until the next tick)
    println!("Applying statuses to {hero}:");
    let base = scope.apply(hero, Status::new(Kind::Hp, 100.0))?;
    println!("  - Base HP: 100");
    scope.apply(hero, Status::new(Kind::Hp, 50.0).with_tag(equipment))?;
    println!("  - Armor HP: +50 (tag {equipment})");
    scope.apply(
        hero,
        Status::new(Kind::Vitality, 20.0).with_duration(Duration::from_secs(3)),
    )?;
    println!("  - Potion vitality: +20 for 3s");

    println!("\nBefore tick: HP = {}", scope.get_status_value(hero, Kind::Hp)?);

    scope.update(Duration::from_secs(1))?;
    println!("After tick:  HP = {}", scope.get_status_value(hero, Kind::Hp)?);

    // Derived value
    let max_hp = Modifier::new(hero, [Kind::Hp, Kind::Vitality], |[hp, vit]| {
        hp * (1.0 + vit / 100.0)
    });
    println!("\nMax HP (HP * (1 + VIT%)): {}", max_hp.get(&scope)?);

    // Potion wears off
    scope.update(Duration::from_secs(4))?;
    println!("\n=== After potion expires ===");
    println!("Vitality: {}", scope.get_status_value(hero, Kind::Vitality)?);
    println!("Max HP:   {}", max_hp.get(&scope)?);

    // Unequip everything tagged as equipment
    scope.remove_by_tag(hero, equipment)?;
    scope.update(Duration::from_secs(5))?;
    println!("\n=== After unequipping ===");
    println!("HP: {}", scope.get_status_value(hero, Kind::Hp)?);

    if let Some(entry) = scope.get_status_entry(hero, Kind::Hp)? {
        println!("  (last changed at {:?})", entry.updated_at);
    }
    println!("Base HP entity alive: {}", scope.is_entity_alive(base)?);

    scope.dispose();
    Ok(())
}
