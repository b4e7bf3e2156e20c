//! street_food: a food stand built from des-flow primitives.
//!
//! Customers wander up at random and join a line.  Each order pairs one
//! customer with one patty from the butcher, goes on the grill while one of
//! the two cooks is free, and is split back apart at the counter: the
//! customer leaves fed, the patty is eaten.
//!
//! ```text
//! street ──▶ line ──▶ ticket ──▶ grill ──▶ counter ──▶ fed
//!                       ▲      (2 cooks)        └────▶ eaten
//! butcher ──────────────┘
//! ```
//!
//! Set `STREET_FOOD_LOG=debug` (or `trace`) to watch individual flows.

use std::rc::Rc;

use anyhow::Result;
use log::LevelFilter;
use rand_distr::Exp;

use des_core::ModelConfig;
use des_flow::{
    Composer, Decomposer, Model, Pool, Provider, Queue, Requirement, Service, Sink, Source,
};
use des_schedule::RunObserver;

// ── Constants ─────────────────────────────────────────────────────────────────

const SEED:              u64 = 42;
const CLOSING_TIME:      f64 = 240.0; // minutes
const MEAN_ARRIVAL_GAP:  f64 = 2.0;
const PATTY_INTERVAL:    f64 = 1.5;
const PATTY_SHELF:       f64 = 6.0;
const LINE_LENGTH:       f64 = 12.0;
const COOKS:             f64 = 2.0;
const GRILL_TIME:        f64 = 3.0;
const RETRY_INTERVAL:    f64 = 0.5;

// ── Observer ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct EventCounter {
    events:     u64,
    final_time: f64,
}

impl RunObserver for EventCounter {
    fn on_event(&mut self, _time: f64, _ordering: i32) {
        self.events += 1;
    }

    fn on_run_end(&mut self, final_time: f64, events: u64) {
        self.final_time = final_time;
        log::info!("run stopped at {final_time:.1} after {events} events");
    }
}

// ── Logging ───────────────────────────────────────────────────────────────────

fn set_up_logger() -> Result<(), fern::InitError> {
    let level = std::env::var("STREET_FOOD_LOG")
        .ok()
        .and_then(|s| s.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("[{}] {}: {}", record.level(), record.target(), message))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()?;
    Ok(())
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    set_up_logger()?;

    let model = Model::new(ModelConfig::default().with_seed(SEED).with_end_time(CLOSING_TIME))?;
    let customer = model.kinds().entity("customer")?;
    let patty = model.kinds().countable("patty")?;
    let order = model.kinds().entity("order")?;
    let staff = model.kinds().countable("cook")?;

    // 1. Arrivals and the line.
    let street = Source::new(&model, "street", customer.clone())?;
    street.set_rate_distribution(Some(Box::new(Exp::new(1.0 / MEAN_ARRIVAL_GAP)?)));
    let line = Queue::new(&model, "line", customer.clone())?;
    line.set_capacity(LINE_LENGTH)?;
    street.add_receiver(line.clone())?;

    // 2. Patty supply.
    let butcher = Source::new(&model, "butcher", patty.clone())?;
    butcher.set_rate(PATTY_INTERVAL, false)?;
    butcher.set_capacity(PATTY_SHELF)?;

    // 3. One customer and one patty make an order.
    let ticket = Composer::new(
        &model,
        "ticket",
        order.clone(),
        vec![
            Requirement::new(customer.clone(), 1.0, 1.0),
            Requirement::new(patty.clone(), 1.0, 1.0),
        ],
    )?;
    line.add_receiver(ticket.clone())?;
    butcher.add_receiver(ticket.clone())?;

    // 4. The grill, staffed from a shared pool of cooks.
    let cooks = Rc::new(Pool::new("cooks", staff.amount(COOKS)?, COOKS)?);
    let grill = Service::new(&model, "grill", order.clone(), cooks.clone(), 1.0, GRILL_TIME)?;
    ticket.add_receiver(grill.clone())?;

    // 5. Hand over at the counter.
    let counter = Decomposer::new(&model, "counter", order)?;
    let fed = Sink::new(&model, "fed", customer);
    let eaten = Sink::new(&model, "eaten", patty);
    counter.add_receiver(fed.clone())?;
    counter.add_receiver(eaten.clone())?;
    grill.add_receiver(counter.clone())?;

    // Blocked stock is offered again every half minute.
    let schedule = model.schedule();
    schedule.schedule_repeating(0.0, RETRY_INTERVAL, 1, line.clone())?;
    schedule.schedule_repeating(0.0, RETRY_INTERVAL, 1, ticket.clone())?;

    street.start_at(0.0)?;
    butcher.start_at(0.0)?;

    println!("=== street_food ===");
    println!("Seed: {SEED}  |  Open for: {CLOSING_TIME} min  |  Cooks: {COOKS}");

    let mut observer = EventCounter::default();
    model.run_with(CLOSING_TIME, &mut observer)?;

    println!();
    println!("Events run:        {}", observer.events);
    println!("Customers arrived: {}", street.total_produced());
    println!("Customers fed:     {}", fed.total_received());
    println!("Patties eaten:     {}", eaten.total_received());
    println!("Still in line:     {}", line.available());
    println!("On the grill:      {}", grill.delay().size());
    println!("Cooks free:        {}", cooks.amount());
    println!("Clock:             {:.1}", observer.final_time);
    Ok(())
}
