use super::*;

use des_core::FlowError;

use crate::{Composer, Decomposer, Requirement, Steppable};

struct Bakery {
    m:     Model,
    flour: ResourceKind,
    egg:   ResourceKind,
    cake:  ResourceKind,
}

fn bakery() -> Bakery {
    let m = model();
    let flour = m.kinds().countable("flour").unwrap();
    let egg = m.kinds().entity("egg").unwrap();
    let cake = m.kinds().entity("cake").unwrap();
    Bakery { m, flour, egg, cake }
}

fn oven(b: &Bakery) -> Rc<Composer> {
    Composer::new(
        &b.m,
        "oven",
        b.cake.clone(),
        vec![
            Requirement::new(b.flour.clone(), 2.0, 2.0),
            Requirement::new(b.egg.clone(), 1.0, 1.0),
        ],
    )
    .unwrap()
}

// ── Composer ──────────────────────────────────────────────────────────────────

#[test]
fn composer_builds_a_composite_once_every_minimum_is_met() {
    let b = bakery();
    let composer = oven(&b);
    let flour = Depot::with_amount(&b.m, "bin", &b.flour, 5.0);
    let eggs = Depot::with_entities(&b.m, "tray", &b.egg, &[7.0]);
    let taker = Taker::new("counter", &b.cake, &new_log());
    flour.add_receiver(composer.clone()).unwrap();
    eggs.add_receiver(composer.clone()).unwrap();
    composer.add_receiver(taker.clone()).unwrap();

    assert!(flour.offer().unwrap());
    assert_eq!(flour.available(), 3.0);
    assert_eq!(composer.total(&b.flour), Some(2.0));
    assert_eq!(taker.total.get(), 0.0);

    // Full: no more flour until a cake leaves.
    assert!(!flour.offer().unwrap());

    assert!(eggs.offer().unwrap());
    assert_eq!(taker.total.get(), 1.0);
    assert_eq!(composer.total(&b.flour), Some(0.0));
    assert_eq!(composer.total(&b.egg), Some(0.0));

    let cakes = taker.entities.borrow();
    let storage = cakes[0].storage().unwrap();
    assert_eq!(storage.len(), 2);
    assert_eq!(storage[0].kind(), &b.flour);
    assert_eq!(storage[0].amount(), 2.0);
    assert_eq!(storage[1].as_entity().and_then(Entity::info), Some(7.0));
}

#[test]
fn composer_waits_for_the_second_unit() {
    let b = bakery();
    let composer = oven(&b);
    let taker = Taker::new("counter", &b.cake, &new_log());
    composer.add_receiver(taker.clone()).unwrap();
    let bin = Depot::new(&b.m, "bin", &b.flour);

    let mut one = b.flour.amount(1.0).unwrap();
    assert!(composer.accept(&*bin, Offer::Amount(&mut one), 1.0, 1.0).unwrap());
    assert_eq!(taker.total.get(), 0.0);

    let mut one = b.flour.amount(1.0).unwrap();
    assert!(composer.accept(&*bin, Offer::Amount(&mut one), 1.0, 1.0).unwrap());
    let mut egg = Some(entity(&b.egg, 1.0));
    assert!(composer.accept(&*bin, Offer::Entity(&mut egg), 1.0, 1.0).unwrap());
    assert!(egg.is_none());

    assert_eq!(taker.total.get(), 1.0);
    let cakes = taker.entities.borrow();
    let storage = cakes[0].storage().unwrap();
    assert_eq!(storage[0].amount(), 2.0);
    assert_eq!(storage[1].amount(), 1.0);
    assert_eq!(composer.total(&b.flour), Some(0.0));
    assert_eq!(composer.total(&b.egg), Some(0.0));
}

#[test]
fn composer_keeps_composites_until_stepped_when_not_offering_immediately() {
    let b = bakery();
    let composer = oven(&b);
    composer.set_offers_immediately(false);
    let flour = Depot::with_amount(&b.m, "bin", &b.flour, 2.0);
    let eggs = Depot::with_entities(&b.m, "tray", &b.egg, &[1.0]);
    let taker = Taker::new("counter", &b.cake, &new_log());
    flour.add_receiver(composer.clone()).unwrap();
    eggs.add_receiver(composer.clone()).unwrap();
    composer.add_receiver(taker.clone()).unwrap();

    flour.offer().unwrap();
    eggs.offer().unwrap();
    assert_eq!(composer.available(), 0.0);

    composer.step().unwrap();
    assert_eq!(taker.total.get(), 1.0);
}

#[test]
fn composer_rejects_kinds_it_does_not_need() {
    let b = bakery();
    let composer = oven(&b);
    let sugar = b.m.kinds().countable("sugar").unwrap();
    let sugar_depot = Depot::with_amount(&b.m, "jar", &sugar, 1.0);
    let mut lot = sugar.amount(1.0).unwrap();

    assert!(matches!(
        composer.accept(&*sugar_depot, Offer::Amount(&mut lot), 0.0, 1.0),
        Err(FlowError::Protocol(_))
    ));
    assert_eq!(lot.amount(), 1.0);
    assert!(composer.typical_received().is_none());
}

#[test]
fn composer_configuration_is_checked() {
    let b = bakery();
    let reqs = || vec![Requirement::new(b.flour.clone(), 1.0, 2.0)];

    assert!(matches!(
        Composer::new(&b.m, "oven", b.flour.clone(), reqs()),
        Err(FlowError::Config(_))
    ));
    let twice = vec![
        Requirement::new(b.flour.clone(), 1.0, 2.0),
        Requirement::new(b.flour.clone(), 1.0, 1.0),
    ];
    assert!(matches!(Composer::new(&b.m, "oven", b.cake.clone(), twice), Err(FlowError::Config(_))));
    let inverted = vec![Requirement::new(b.flour.clone(), 3.0, 2.0)];
    assert!(matches!(Composer::new(&b.m, "oven", b.cake.clone(), inverted), Err(FlowError::Config(_))));
    let half_egg = vec![Requirement::new(b.egg.clone(), 0.5, 1.0)];
    assert!(matches!(Composer::new(&b.m, "oven", b.cake.clone(), half_egg), Err(FlowError::Config(_))));
    let no_egg = vec![
        Requirement::new(b.flour.clone(), 1.0, 1.0),
        Requirement::new(b.egg.clone(), 0.0, 1.0),
    ];
    assert!(matches!(Composer::new(&b.m, "oven", b.cake.clone(), no_egg), Err(FlowError::Config(_))));
}

#[test]
fn rescind_and_clear_give_up_what_was_gathered() {
    let b = bakery();
    let composer = oven(&b);
    let flour = Depot::with_amount(&b.m, "bin", &b.flour, 2.0);
    flour.add_receiver(composer.clone()).unwrap();
    flour.offer().unwrap();

    assert!(composer.rescind(&b.flour, 5.0, true).unwrap().is_empty());
    let back = composer.rescind(&b.flour, 1.0, false).unwrap();
    assert_eq!(back.len(), 1);
    assert_eq!(back[0].amount(), 1.0);
    assert_eq!(composer.total(&b.flour), Some(1.0));
    assert!(composer.rescind(&b.egg, 1.0, false).unwrap().is_empty());
    assert!(matches!(composer.rescind(&b.flour, -1.0, false), Err(FlowError::InvalidAmount(_))));

    composer.clear();
    assert_eq!(composer.total(&b.flour), Some(0.0));
    assert_eq!(composer.total(&b.cake), None);
}

// ── Decomposer ────────────────────────────────────────────────────────────────

fn cake(b: &Bakery) -> Entity {
    Entity::composite(
        b.cake.clone(),
        vec![
            Resource::Countable(b.flour.amount(2.0).unwrap()),
            Resource::Entity(entity(&b.egg, 7.0)),
        ],
    )
    .unwrap()
}

fn plate(b: &Bakery) -> (Rc<Depot>, Rc<Decomposer>) {
    let plate = Depot::new(&b.m, "plate", &b.cake);
    plate.core.push_entity(cake(b)).unwrap();
    let knife = Decomposer::new(&b.m, "knife", b.cake.clone()).unwrap();
    plate.add_receiver(knife.clone()).unwrap();
    (plate, knife)
}

#[test]
fn decomposer_routes_each_constituent_by_kind() {
    let b = bakery();
    let (plate, knife) = plate(&b);
    let log = new_log();
    let flour_taker = Taker::new("flour", &b.flour, &log);
    let egg_taker = Taker::new("egg", &b.egg, &log);
    knife.add_receiver(flour_taker.clone()).unwrap();
    knife.add_receiver(egg_taker.clone()).unwrap();

    assert!(plate.offer().unwrap());
    assert_eq!(flour_taker.total.get(), 2.0);
    assert_eq!(egg_taker.infos(), [7.0]);
    assert_eq!(*log.borrow(), ["flour", "egg"]);
    assert_eq!(plate.available(), 0.0);
    assert_eq!(knife.total_dropped(), 0.0);
}

#[test]
fn unrouted_constituents_are_dropped() {
    let b = bakery();
    let (plate, knife) = plate(&b);
    let flour_taker = Taker::new("flour", &b.flour, &new_log());
    knife.add_receiver(flour_taker.clone()).unwrap();

    assert!(plate.offer().unwrap());
    assert_eq!(flour_taker.total.get(), 2.0);
    assert_eq!(knife.total_dropped(), 1.0);
}

#[test]
fn composite_stays_whole_when_nothing_is_taken() {
    let b = bakery();
    let (plate, knife) = plate(&b);
    let log = new_log();
    knife.add_receiver(Taker::refusing("flour", &b.flour, &log)).unwrap();
    knife.add_receiver(Taker::refusing("egg", &b.egg, &log)).unwrap();

    assert!(!plate.offer().unwrap());
    assert_eq!(plate.available(), 1.0);
    let left = plate.core.entities();
    assert_eq!(left[0].storage().map(<[Resource]>::len), Some(2));
    assert_eq!(knife.total_dropped(), 0.0);
}

/// Fails every offer without taking anything.
struct Jammed(ResourceKind);

impl Named for Jammed {
    fn name(&self) -> String {
        "jammed".into()
    }
}

impl Receiver for Jammed {
    fn typical_received(&self) -> Option<ResourceKind> {
        Some(self.0.clone())
    }

    fn accept(&self, _: &dyn Provider, _: Offer<'_>, _: f64, _: f64) -> FlowResult<bool> {
        Err(FlowError::Protocol("jammed".into()))
    }
}

#[test]
fn failing_route_leaves_the_rest_in_the_composite() {
    let b = bakery();
    let (plate, knife) = plate(&b);
    let flour_taker = Taker::new("flour", &b.flour, &new_log());
    knife.add_receiver(flour_taker.clone()).unwrap();
    knife.add_receiver(Rc::new(Jammed(b.egg.clone()))).unwrap();

    assert!(matches!(plate.offer(), Err(FlowError::Protocol(_))));
    assert_eq!(flour_taker.total.get(), 2.0);
    let left = plate.core.entities();
    assert_eq!(left.len(), 1);
    let storage = left[0].storage().unwrap();
    assert_eq!(storage.len(), 1);
    assert_eq!(storage[0].as_entity().and_then(Entity::info), Some(7.0));
    assert_eq!(knife.total_dropped(), 0.0);
}

#[test]
fn decomposer_needs_composites_and_single_kind_routes() {
    let b = bakery();
    let (_plate, knife) = plate(&b);

    let plain = Depot::with_entities(&b.m, "bare", &b.cake, &[1.0]);
    plain.add_receiver(knife.clone()).unwrap();
    assert!(matches!(plain.offer(), Err(FlowError::Protocol(_))));

    let flour_taker = Taker::new("flour", &b.flour, &new_log());
    assert!(knife.add_receiver(flour_taker.clone()).unwrap());
    assert!(!knife.add_receiver(flour_taker.clone()).unwrap());
    assert!(matches!(
        knife.add_receiver(Taker::new("other", &b.flour, &new_log())),
        Err(FlowError::Config(_))
    ));
    assert!(matches!(knife.add_receiver(oven(&b)), Err(FlowError::Config(_))));
    assert!(knife.remove_receiver(&*flour_taker));
    assert!(knife.route(&b.flour).is_none());

    assert!(matches!(Decomposer::new(&b.m, "bad", b.flour.clone()), Err(FlowError::Config(_))));
}
