//! Sensor sources and the clock used to timestamp readings.

use std::ops::Range;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use water_quality::{Parameter, Reading};

// ------------------------------------------------------------------ //
//  Clock                                                              //
// ------------------------------------------------------------------ //

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ------------------------------------------------------------------ //
//  Trait                                                              //
// ------------------------------------------------------------------ //

/// Supplies the latest reading for a pool.
#[async_trait]
pub trait SensorSource: Send + Sync {
    async fn read(&self, pool_id: &str) -> Result<Reading>;

    /// Back-dated readings, newest first, to seed an empty history.
    /// Sources without history return nothing.
    async fn backfill(&self, _pool_id: &str, _count: usize) -> Result<Vec<Reading>> {
        Ok(Vec::new())
    }
}

// ------------------------------------------------------------------ //
//  SimulatedSensor                                                    //
// ------------------------------------------------------------------ //

/// Uniform ranges the simulator draws from, per parameter.
pub fn simulated_range(parameter: Parameter) -> Range<f64> {
    match parameter {
        Parameter::Temperature     => 18.0..23.0,
        Parameter::Ph              => 6.5..8.0,
        Parameter::DissolvedOxygen => 6.0..9.0,
        Parameter::Ammonia         => 0.1..2.1,
        Parameter::Nitrite         => 0.05..1.05,
        Parameter::Nitrate         => 5.0..45.0,
        Parameter::WaterLevel      => 80.0..100.0,
        Parameter::Turbidity       => 2.0..12.0,
        Parameter::Bod             => 1.0..9.0,
        Parameter::Co2             => 5.0..20.0,
        Parameter::Alkalinity      => 80.0..200.0,
        Parameter::Hardness        => 100.0..300.0,
        Parameter::Calcium         => 20.0..100.0,
        Parameter::Phosphorus      => 0.5..3.5,
        Parameter::H2s             => 0.01..0.51,
        Parameter::Plankton        => 1_000.0..51_000.0,
    }
}

/// Stand-in for real hardware: random values in plausible ranges.
pub struct SimulatedSensor {
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
    backfill_step: Duration,
}

impl SimulatedSensor {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::from_rng(clock, StdRng::from_entropy())
    }

    /// Reproducible sequence for tests and demos.
    pub fn seeded(clock: Arc<dyn Clock>, seed: u64) -> Self {
        Self::from_rng(clock, StdRng::seed_from_u64(seed))
    }

    fn from_rng(clock: Arc<dyn Clock>, rng: StdRng) -> Self {
        Self { clock, rng: Mutex::new(rng), backfill_step: Duration::hours(1) }
    }

    pub fn with_backfill_step(mut self, step: Duration) -> Self {
        self.backfill_step = step;
        self
    }

    fn sample(&self, timestamp: DateTime<Utc>) -> Result<Reading> {
        let mut rng = self.rng.lock().map_err(|_| anyhow!("simulator rng poisoned"))?;
        let mut reading = Reading::new(timestamp);
        for p in Parameter::ALL {
            reading.set(p, rng.gen_range(simulated_range(p)));
        }
        Ok(reading)
    }
}

#[async_trait]
impl SensorSource for SimulatedSensor {
    async fn read(&self, _pool_id: &str) -> Result<Reading> {
        self.sample(self.clock.now())
    }

    async fn backfill(&self, _pool_id: &str, count: usize) -> Result<Vec<Reading>> {
        let now = self.clock.now();
        (0..count)
            .map(|i| self.sample(now - self.backfill_step * i as i32))
            .collect()
    }
}

// ------------------------------------------------------------------ //
//  Tests                                                              //
// ------------------------------------------------------------------ //
