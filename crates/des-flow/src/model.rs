//! The model context every component is built against.

use std::cell::Cell;
use std::rc::Rc;

use des_core::{ComponentId, ComponentRng, FlowResult, KindRegistry, ModelConfig};
use des_schedule::{NoopObserver, RunObserver, Schedule, Scheduler};

/// Owns the scheduler and the kind registry, and hands each component its
/// id and deterministic RNG stream.
///
/// ```rust,ignore
/// let model = Model::new(ModelConfig::default().with_seed(7))?;
/// let burger = model.kinds().entity("burger")?;
/// let queue = Queue::new(&model, "line", burger)?;
/// model.run_until(100.0)?;
/// ```
pub struct Model {
    config:         ModelConfig,
    scheduler:      Rc<Scheduler>,
    kinds:          KindRegistry,
    next_component: Cell<u32>,
}

impl Model {
    pub fn new(config: ModelConfig) -> FlowResult<Self> {
        let scheduler = Rc::new(Scheduler::from_config(&config)?);
        Ok(Self {
            config,
            scheduler,
            kinds: KindRegistry::new(),
            next_component: Cell::new(0),
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn kinds(&self) -> &KindRegistry {
        &self.kinds
    }

    pub fn scheduler(&self) -> &Rc<Scheduler> {
        &self.scheduler
    }

    /// The scheduler as the trait object components hold.
    pub fn schedule(&self) -> Rc<dyn Schedule> {
        self.scheduler.clone()
    }

    pub fn time(&self) -> f64 {
        self.scheduler.time()
    }

    /// Allocate the next component id and its RNG stream.
    pub fn register_component(&self) -> (ComponentId, ComponentRng) {
        let id = ComponentId(self.next_component.get());
        self.next_component.set(id.0 + 1);
        (id, ComponentRng::new(self.config.seed, id))
    }

    pub fn component_count(&self) -> usize {
        self.next_component.get() as usize
    }

    /// Run all events due before `end`.  Returns the number of events run.
    pub fn run_until(&self, end: f64) -> FlowResult<u64> {
        self.scheduler.run_until(end, &mut NoopObserver)
    }

    pub fn run_with<O: RunObserver>(&self, end: f64, observer: &mut O) -> FlowResult<u64> {
        self.scheduler.run_until(end, observer)
    }
}
