use super::*;

use des_core::FlowError;

use crate::{Lock, Pool, Service, SimpleDelay, Sink, Unlock};

fn staff_pool(m: &Model, amount: f64, maximum: f64) -> Rc<Pool> {
    let staff = m.kinds().countable("staff").unwrap();
    Rc::new(Pool::new("staff", staff.amount(amount).unwrap(), maximum).unwrap())
}

// ── Pool ──────────────────────────────────────────────────────────────────────

#[test]
fn pool_takes_exactly_or_not_at_all() {
    let m = model();
    let pool = staff_pool(&m, 3.0, 5.0);

    assert!(pool.try_take(2.0));
    assert!(!pool.try_take(2.0));
    assert_eq!(pool.amount(), 1.0);
    assert_eq!(pool.give(10.0), 4.0);
    assert_eq!(pool.amount(), 5.0);
    assert_eq!(pool.give(1.0), 0.0);

    pool.reset();
    assert_eq!(pool.amount(), 3.0);
    pool.set_maximum(2.0).unwrap();
    assert_eq!(pool.amount(), 2.0);
}

#[test]
fn pool_maximum_must_cover_the_initial_amount() {
    let m = model();
    let staff = m.kinds().countable("staff").unwrap();
    assert!(matches!(
        Pool::new("staff", staff.amount(3.0).unwrap(), 2.0),
        Err(FlowError::Config(_))
    ));
    assert!(Pool::unbounded("staff", staff.amount(3.0).unwrap()).is_ok());
}

#[test]
fn pool_of_countables_needs_a_whole_maximum() {
    let m = model();
    let staff = m.kinds().countable("staff").unwrap();
    assert!(matches!(
        Pool::new("staff", staff.amount(1.0).unwrap(), 2.5),
        Err(FlowError::Config(_))
    ));

    let pool = staff_pool(&m, 5.0, 5.0);
    assert!(matches!(pool.set_maximum(2.5), Err(FlowError::Config(_))));
    assert!(matches!(pool.set_maximum(f64::NAN), Err(FlowError::Config(_))));
    assert_eq!(pool.amount(), 5.0);
    assert_eq!(pool.maximum(), 5.0);

    let water = m.kinds().uncountable("water").unwrap();
    let tank = Pool::new("tank", water.amount(5.0).unwrap(), 5.0).unwrap();
    tank.set_maximum(2.5).unwrap();
    assert_eq!(tank.amount(), 2.5);
}

// ── Lock and Unlock ───────────────────────────────────────────────────────────

struct Line {
    depot: Rc<Depot>,
    lock:  Rc<Lock>,
    taker: Rc<Taker>,
}

fn locked_line(m: &Model, pool: &Rc<Pool>) -> Line {
    let car = m.kinds().entity("car").unwrap();
    let depot = Depot::with_entities(m, "lot", &car, &[1.0, 2.0]);
    let lock = Lock::new(m, "gate", car.clone(), pool.clone(), 1.0).unwrap();
    let taker = Taker::new("wash", &car, &new_log());
    depot.add_receiver(lock.clone()).unwrap();
    lock.add_receiver(taker.clone()).unwrap();
    Line { depot, lock, taker }
}

#[test]
fn lock_passes_offers_while_the_pool_lasts() {
    let m = model();
    let pool = staff_pool(&m, 1.0, 1.0);
    let line = locked_line(&m, &pool);

    assert!(line.depot.offer().unwrap());
    assert_eq!(line.taker.infos(), [1.0]);
    assert_eq!(pool.amount(), 0.0);

    // Empty pool: refused, and the depot keeps its entity.
    assert!(!line.depot.offer().unwrap());
    assert_eq!(line.depot.available(), 1.0);
    assert_eq!(pool.amount(), 0.0);
}

#[test]
fn lock_gives_back_when_downstream_refuses() {
    let m = model();
    let pool = staff_pool(&m, 1.0, 1.0);
    let line = locked_line(&m, &pool);
    line.taker.refuse.set(true);

    assert!(!line.depot.offer().unwrap());
    assert_eq!(pool.amount(), 1.0);
    assert_eq!(line.depot.available(), 2.0);
}

#[test]
fn refusing_lock_leaves_the_pool_alone() {
    let m = model();
    let pool = staff_pool(&m, 1.0, 1.0);
    let line = locked_line(&m, &pool);
    line.lock.set_refuses_offers(true);

    assert!(!line.depot.offer().unwrap());
    assert_eq!(pool.amount(), 1.0);
    assert!(line.taker.infos().is_empty());
}

#[test]
fn lock_amount_must_suit_the_pool() {
    let m = model();
    let pool = staff_pool(&m, 1.0, 1.0);
    let car = m.kinds().entity("car").unwrap();
    assert!(matches!(
        Lock::new(&m, "gate", car.clone(), pool.clone(), 0.5),
        Err(FlowError::Config(_))
    ));
    assert!(matches!(Unlock::new(&m, "exit", car, pool, -1.0), Err(FlowError::Config(_))));
}

#[test]
fn unlock_takes_back_what_it_released_on_refusal() {
    let m = model();
    let pool = staff_pool(&m, 0.0, 1.0);
    let car = m.kinds().entity("car").unwrap();
    let depot = Depot::with_entities(&m, "lot", &car, &[1.0]);
    let unlock = Unlock::new(&m, "exit", car.clone(), pool.clone(), 1.0).unwrap();
    let taker = Taker::refusing("road", &car, &new_log());
    depot.add_receiver(unlock.clone()).unwrap();
    unlock.add_receiver(taker.clone()).unwrap();

    assert!(!depot.offer().unwrap());
    assert_eq!(pool.amount(), 0.0);

    taker.refuse.set(false);
    assert!(depot.offer().unwrap());
    assert_eq!(pool.amount(), 1.0);
}

#[test]
fn unlock_release_is_capped_by_the_pool_maximum() {
    let m = model();
    let pool = staff_pool(&m, 1.0, 1.0);
    let car = m.kinds().entity("car").unwrap();
    let depot = Depot::with_entities(&m, "lot", &car, &[1.0]);
    let unlock = Unlock::new(&m, "exit", car.clone(), pool.clone(), 1.0).unwrap();
    let taker = Taker::refusing("road", &car, &new_log());
    depot.add_receiver(unlock.clone()).unwrap();
    unlock.add_receiver(taker.clone()).unwrap();

    // Nothing was released, so nothing is taken back.
    assert!(!depot.offer().unwrap());
    assert_eq!(pool.amount(), 1.0);
}

#[test]
fn partnered_unlock_pulls_a_waiting_line_forward() {
    let m = model();
    let pool = staff_pool(&m, 1.0, 1.0);
    let car = m.kinds().entity("car").unwrap();

    // Two lines share one member of staff.  When line A frees them, line
    // B's gate asks its depot to offer again.
    let depot_a = Depot::with_entities(&m, "lot a", &car, &[1.0]);
    let lock_a = Lock::new(&m, "gate a", car.clone(), pool.clone(), 1.0).unwrap();
    let work_a = SimpleDelay::new(&m, "work a", car.clone(), 1.0).unwrap();
    let unlock_a = Unlock::from_lock(&m, "exit a", &lock_a).unwrap();
    let sink_a = Sink::new(&m, "out a", car.clone());
    depot_a.add_receiver(lock_a.clone()).unwrap();
    lock_a.add_receiver(work_a.clone()).unwrap();
    work_a.add_receiver(unlock_a.clone()).unwrap();
    unlock_a.add_receiver(sink_a.clone()).unwrap();

    let depot_b = Depot::with_entities(&m, "lot b", &car, &[2.0]);
    let lock_b = Lock::new(&m, "gate b", car.clone(), pool.clone(), 1.0).unwrap();
    let work_b = SimpleDelay::new(&m, "work b", car.clone(), 1.0).unwrap();
    depot_b.add_receiver(lock_b.clone()).unwrap();
    lock_b.add_receiver(work_b.clone()).unwrap();
    lock_b.add_provider(&depot_b);
    unlock_a.set_partner(Some(&lock_b));

    assert!(depot_a.offer().unwrap());
    assert!(!depot_b.offer().unwrap());
    assert_eq!(pool.amount(), 0.0);

    m.run_until(1.5).unwrap();
    assert_eq!(sink_a.total_received(), 1.0);
    assert_eq!(depot_b.available(), 0.0);
    assert_eq!(work_b.size(), 1);
    assert_eq!(pool.amount(), 0.0);
}

// ── Service ───────────────────────────────────────────────────────────────────

#[test]
fn service_admits_up_to_the_pool_and_frees_it_on_exit() {
    let m = model();
    let pool = staff_pool(&m, 2.0, 2.0);
    let car = m.kinds().entity("car").unwrap();
    let depot = Depot::with_entities(&m, "lot", &car, &[1.0, 2.0, 3.0]);
    depot.core.set_offers_all_entities(true);
    let service = Service::new(&m, "garage", car.clone(), pool.clone(), 1.0, 3.0).unwrap();
    let sink = Sink::new(&m, "road", car);
    depot.add_receiver(service.clone()).unwrap();
    service.add_receiver(sink.clone()).unwrap();

    assert!(depot.offer().unwrap());
    assert_eq!(service.delay().size(), 2);
    assert_eq!(depot.available(), 1.0);
    assert_eq!(pool.amount(), 0.0);

    m.run_until(4.0).unwrap();
    assert_eq!(sink.total_received(), 2.0);
    assert_eq!(pool.amount(), 2.0);

    assert!(depot.offer().unwrap());
    assert_eq!(pool.amount(), 1.0);
    assert_eq!(service.name(), "garage");
    assert_eq!(service.lock().name(), "garage/lock");
}
