use std::sync::Arc;

/// Common clocked behavior of every simulated hardware module.
pub trait ModuleBehaviors {
    /// Advance the module by one clock edge.
    fn tick_one(&mut self);

    /// Force the module back to its power-on state.
    fn reset(&mut self);

    fn tick(&mut self, cycles: u64) {
        for _ in 0..cycles {
            self.tick_one();
        }
    }
}

pub trait Parameterizable {
    type ConfigType;

    fn conf(&self) -> &Self::ConfigType;

    fn init_conf(&mut self, conf: Arc<Self::ConfigType>);
}
