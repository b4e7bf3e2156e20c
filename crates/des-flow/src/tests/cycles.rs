use super::*;

use des_core::FlowError;

use crate::{Broker, Lock, Multi, MultiHandler, Pool, Queue, Transactor, Unlock};

// ── Offers ────────────────────────────────────────────────────────────────────

#[test]
fn queue_loop_is_a_cyclic_offer() {
    let m = model();
    let grain = m.kinds().countable("grain").unwrap();
    let depot = Depot::with_amount(&m, "silo", &grain, 5.0);
    let q1 = Queue::new(&m, "q1", grain.clone()).unwrap();
    let q2 = Queue::new(&m, "q2", grain.clone()).unwrap();
    depot.add_receiver(q1.clone()).unwrap();
    q1.add_receiver(q2.clone()).unwrap();
    q2.add_receiver(q1.clone()).unwrap();

    let err = depot.offer().unwrap_err();
    assert!(matches!(err, FlowError::CyclicOffer(ref at) if at == "q1"), "{err}");
    assert!(err.is_cyclic());

    // Every guard is released on the way out.
    assert!(!depot.core.is_offering());
    assert!(!q1.provider().is_offering());
    assert!(!q2.provider().is_offering());
}

// ── Multi ─────────────────────────────────────────────────────────────────────

/// Passes anything arriving on receiver port `p` out of provider port `p`.
struct PassThrough;

impl MultiHandler for PassThrough {
    fn accept(
        &self,
        multi: &Multi,
        port: usize,
        _provider: &dyn Provider,
        offer: Offer<'_>,
        at_least: f64,
        at_most: f64,
    ) -> FlowResult<bool> {
        multi.offer_receivers(port, offer, at_least, at_most)
    }
}

#[test]
fn multi_passes_offers_between_ports() {
    let m = model();
    let grain = m.kinds().countable("grain").unwrap();
    let log = new_log();
    let multi = Multi::new(&m, "hub", &[grain.clone()], &[grain.clone()], Box::new(PassThrough)).unwrap();
    let depot = Depot::with_amount(&m, "silo", &grain, 6.0);
    let taker = Taker::new("t", &grain, &log);
    depot.add_receiver(multi.receiver(0).unwrap()).unwrap();
    multi.provider(0).unwrap().add_receiver(taker.clone()).unwrap();

    assert!(depot.offer().unwrap());
    assert_eq!(taker.total.get(), 6.0);
    assert!(!multi.is_busy());
}

#[test]
fn multi_loop_through_its_own_ports_is_cyclic() {
    let m = model();
    let grain = m.kinds().countable("grain").unwrap();
    let multi = Multi::new(&m, "hub", &[grain.clone()], &[grain.clone()], Box::new(PassThrough)).unwrap();
    let depot = Depot::with_amount(&m, "silo", &grain, 6.0);
    depot.add_receiver(multi.receiver(0).unwrap()).unwrap();
    multi.provider(0).unwrap().add_receiver(multi.receiver(0).unwrap()).unwrap();

    let err = depot.offer().unwrap_err();
    assert!(matches!(err, FlowError::CyclicOffer(_)), "{err}");
    assert!(!multi.is_busy());
    assert_eq!(depot.available(), 6.0);
}

#[test]
fn multi_request_pulls_through_a_receiver_port() {
    let m = model();
    let grain = m.kinds().countable("grain").unwrap();
    let multi = Multi::new(&m, "hub", &[grain.clone()], &[grain.clone()], Box::new(PassThrough)).unwrap();
    let depot = Depot::with_amount(&m, "silo", &grain, 6.0);
    let taker = Taker::new("t", &grain, &new_log());
    multi.provider(0).unwrap().add_receiver(taker.clone()).unwrap();

    assert!(multi.request(0, &*depot, 4.0).unwrap());
    assert_eq!(taker.total.get(), 4.0);
    assert_eq!(depot.available(), 2.0);
}

#[test]
fn multi_rejects_unknown_ports() {
    let m = model();
    let grain = m.kinds().countable("grain").unwrap();
    let multi = Multi::new(&m, "hub", &[grain.clone()], &[], Box::new(PassThrough)).unwrap();
    let mut lot = grain.amount(1.0).unwrap();

    assert!(multi.receiver(1).is_none());
    assert!(multi.provider(0).is_none());
    assert!(matches!(
        multi.offer_receivers(0, Offer::Amount(&mut lot), 0.0, 1.0),
        Err(FlowError::Protocol(_))
    ));
    assert!(multi.broker(0, 0).is_err());
}

// ── Transactions ──────────────────────────────────────────────────────────────

/// Swaps input for the same amount of `output`, or hands the trade on to
/// `inner` when set.
struct Swap {
    output: ResourceKind,
    inner:  Rc<RefCell<Option<Rc<Broker>>>>,
}

impl Swap {
    fn new(output: &ResourceKind) -> (Self, Rc<RefCell<Option<Rc<Broker>>>>) {
        let inner = Rc::new(RefCell::new(None));
        (Swap { output: output.clone(), inner: inner.clone() }, inner)
    }
}

impl MultiHandler for Swap {
    fn transact(
        &self,
        _multi: &Multi,
        _provider_port: usize,
        _receiver_port: usize,
        mut provided: Offer<'_>,
        at_least: f64,
        at_most: f64,
        at_least_requested: f64,
    ) -> FlowResult<Option<Resource>> {
        let inner = self.inner.borrow().clone();
        if let Some(broker) = inner {
            return broker.transact(provided, at_least, at_most, &self.output, at_least_requested);
        }
        let Some(taken) = provided.take_amount(at_most)? else {
            return Ok(None);
        };
        Ok(Some(Resource::Countable(self.output.amount(taken.amount())?)))
    }
}

#[test]
fn broker_trades_through_the_handler() {
    let m = model();
    let corn = m.kinds().countable("corn").unwrap();
    let meal = m.kinds().uncountable("meal").unwrap();
    let (handler, _) = Swap::new(&meal);
    let multi = Multi::new(&m, "mill", &[corn.clone()], &[meal.clone()], Box::new(handler)).unwrap();
    let broker = multi.broker(0, 0).unwrap();
    let mut sack = corn.amount(5.0).unwrap();

    let got = broker.transact(Offer::Amount(&mut sack), 0.0, 5.0, &meal, 0.0).unwrap().unwrap();
    assert_eq!(got.kind(), &meal);
    assert_eq!(got.amount(), 5.0);
    assert_eq!(sack.amount(), 0.0);

    // Asking for the wrong kind fails before the handler runs.
    let mut sack = corn.amount(5.0).unwrap();
    assert!(matches!(
        broker.transact(Offer::Amount(&mut sack), 0.0, 5.0, &corn, 0.0),
        Err(FlowError::TypeMismatch { .. })
    ));
    assert_eq!(sack.amount(), 5.0);
}

#[test]
fn trading_through_another_broker_is_fine() {
    let m = model();
    let corn = m.kinds().countable("corn").unwrap();
    let meal = m.kinds().uncountable("meal").unwrap();
    let (mill, _) = Swap::new(&meal);
    let mill = Multi::new(&m, "mill", &[corn.clone()], &[meal.clone()], Box::new(mill)).unwrap();
    let (agent, inner) = Swap::new(&meal);
    let agent = Multi::new(&m, "agent", &[corn.clone()], &[meal.clone()], Box::new(agent)).unwrap();
    *inner.borrow_mut() = Some(mill.broker(0, 0).unwrap());

    let mut sack = corn.amount(3.0).unwrap();
    let got = agent.broker(0, 0).unwrap().transact(Offer::Amount(&mut sack), 0.0, 3.0, &meal, 0.0);
    assert_eq!(got.unwrap().map(|r| r.amount()), Some(3.0));
}

#[test]
fn nested_transaction_on_the_same_broker_is_cyclic() {
    let m = model();
    let corn = m.kinds().countable("corn").unwrap();
    let meal = m.kinds().uncountable("meal").unwrap();
    let (handler, inner) = Swap::new(&meal);
    let multi = Multi::new(&m, "mill", &[corn.clone()], &[meal.clone()], Box::new(handler)).unwrap();
    let broker = multi.broker(0, 0).unwrap();
    *inner.borrow_mut() = Some(broker.clone());

    let mut sack = corn.amount(5.0).unwrap();
    let err = broker.transact(Offer::Amount(&mut sack), 0.0, 5.0, &meal, 0.0).unwrap_err();
    assert!(matches!(err, FlowError::CyclicTransaction(_)), "{err}");
    assert!(!multi.is_busy());
    assert_eq!(sack.amount(), 5.0);
}

// ── Partnering ────────────────────────────────────────────────────────────────

#[test]
fn unlock_reentered_while_pulling_for_its_partner_is_cyclic() {
    let m = model();
    let car = m.kinds().entity("car").unwrap();
    let staff = m.kinds().countable("staff").unwrap();
    let log = new_log();
    let pool = Rc::new(Pool::new("staff", staff.zero().unwrap(), 10.0).unwrap());

    // first ──▶ unlock ──▶ taker, and unlock's partner feeds unlock again.
    let first = Depot::with_entities(&m, "first", &car, &[1.0]);
    let second = Depot::with_entities(&m, "second", &car, &[2.0]);
    let unlock = Unlock::new(&m, "unlock", car.clone(), pool.clone(), 1.0).unwrap();
    let lock = Lock::new(&m, "lock", car.clone(), pool.clone(), 1.0).unwrap();
    first.add_receiver(unlock.clone()).unwrap();
    unlock.add_receiver(Taker::new("t", &car, &log)).unwrap();
    lock.add_receiver(unlock.clone()).unwrap();
    lock.add_provider(&second);
    unlock.set_partner(Some(&lock));

    let err = first.offer().unwrap_err();
    assert!(matches!(err, FlowError::CyclicPartnering(ref at) if at == "unlock"), "{err}");
    assert!(!lock.provider().is_offering());
}
