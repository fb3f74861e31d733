use std::io::BufRead;
use std::time::{Duration, Instant};
use tracing::debug;
use crate::cache::{AccessOutcome, CacheModel, CacheStats};
use crate::config::CacheConfig;
use crate::error::{ConfigurationError, TraceError};
use crate::trace::{TraceReader, TraceRecord};

/// The simulator replays trace records against a cache model and keeps track of how long that
/// took.
///
/// It supports calling simulate multiple times, the counters and the time taken carry over
pub struct Simulator {
    cache: CacheModel,
    simulation_time: Duration,
    records: u64,
}

/// The outcomes of the cache accesses implied by one record, in the order they were made
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Replay {
    outcomes: [AccessOutcome; 2],
    len: usize,
}

impl Replay {
    fn new() -> Self {
        Self {
            outcomes: [AccessOutcome::Hit; 2],
            len: 0,
        }
    }

    fn push(&mut self, outcome: AccessOutcome) {
        self.outcomes[self.len] = outcome;
        self.len += 1;
    }

    pub fn outcomes(&self) -> &[AccessOutcome] {
        &self.outcomes[..self.len]
    }
}

impl Simulator {
    /// Creates a new simulator with an empty cache
    pub fn new(config: CacheConfig) -> Result<Self, ConfigurationError> {
        Ok(Self {
            cache: CacheModel::new(config)?,
            simulation_time: Duration::new(0, 0),
            records: 0,
        })
    }

    /// Replays one record. Loads and stores access the cache once, modifies access it twice (a
    /// load then a store), and instruction fetches don't access it at all
    ///
    /// # Examples
    ///
    /// ```
    /// use csimlib::cache::AccessOutcome;
    /// use csimlib::config::{CacheConfig, RawCacheConfig};
    /// use csimlib::simulator::Simulator;
    /// let config = CacheConfig::try_from(RawCacheConfig::new(4, 1, 4)).unwrap();
    /// let mut simulator = Simulator::new(config).unwrap();
    /// let replay = simulator.replay(&" M 20,1".parse().unwrap());
    /// assert_eq!(replay.outcomes(), &[AccessOutcome::Miss, AccessOutcome::Hit]);
    /// ```
    pub fn replay(&mut self, record: &TraceRecord) -> Replay {
        let mut replay = Replay::new();
        for _ in 0..record.kind.access_count() {
            replay.push(self.cache.access(record.address));
        }
        self.records += 1;
        replay
    }

    /// Replays a whole trace, see [`Simulator::simulate_with`]
    pub fn simulate<R: BufRead>(&mut self, reader: R) -> Result<&CacheStats, TraceError> {
        self.simulate_with(reader, |_, _| {})
    }

    /// Replays a whole trace, calling `observer` with every data record and its outcomes.
    /// Instruction fetches are read but never reach the cache or the observer
    ///
    /// Stops at the first unreadable or malformed line; records before it have already been
    /// applied
    pub fn simulate_with<R, F>(&mut self, reader: R, mut observer: F) -> Result<&CacheStats, TraceError>
    where
        R: BufRead,
        F: FnMut(&TraceRecord, &[AccessOutcome]),
    {
        let start = Instant::now();
        let result = TraceReader::new(reader).try_for_each(|record| -> Result<(), TraceError> {
            let record = record?;
            let replay = self.replay(&record);
            if record.kind.access_count() > 0 {
                observer(&record, replay.outcomes());
            }
            Ok(())
        });
        self.simulation_time += start.elapsed();
        result?;
        debug!(records = self.records, stats = %self.cache.stats(), "Trace replayed");
        Ok(self.cache.stats())
    }

    pub fn get_cache(&self) -> &CacheModel {
        &self.cache
    }

    pub fn get_stats(&self) -> &CacheStats {
        self.cache.stats()
    }

    /// Gets the wall-clock execution time for processing
    pub fn get_execution_time(&self) -> &Duration {
        &self.simulation_time
    }

    /// Number of records replayed, instruction fetches included
    pub fn get_record_count(&self) -> u64 {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::AccessOutcome::*;
    use crate::config::RawCacheConfig;
    use crate::trace::AccessKind;

    fn simulator(s: i64, e: i64, b: i64) -> Simulator {
        Simulator::new(CacheConfig::try_from(RawCacheConfig::new(s, e, b)).unwrap()).unwrap()
    }

    #[test]
    fn instruction_fetches_are_ignored() {
        let mut sim = simulator(1, 1, 1);
        let replay = sim.replay(&TraceRecord { kind: AccessKind::Instruction, address: 0x40, size: 4 });
        assert!(replay.outcomes().is_empty());
        assert_eq!(*sim.get_stats(), CacheStats::default());
        assert_eq!(sim.get_cache().uninitialised_line_count(), 2);
        assert_eq!(sim.get_record_count(), 1);
    }

    #[test]
    fn modify_misses_then_hits() {
        let mut sim = simulator(2, 1, 2);
        sim.replay(&TraceRecord { kind: AccessKind::Load, address: 0x0, size: 1 });
        // Same set, different tag, so the first half evicts
        let replay = sim.replay(&TraceRecord { kind: AccessKind::Modify, address: 0x40, size: 1 });
        assert_eq!(replay.outcomes(), &[MissWithEviction, Hit]);
        let replay = sim.replay(&TraceRecord { kind: AccessKind::Modify, address: 0x104, size: 1 });
        assert_eq!(replay.outcomes(), &[Miss, Hit]);
    }

    #[test]
    fn verbose_observer_sees_data_records_only() {
        let trace = "I 0400d7d4,8\n L 10,1\n M 20,1\n L 22,1\n S 18,1\n L 110,1\n L 210,1\n M 12,1\n";
        let mut sim = simulator(4, 1, 4);
        let mut lines = Vec::new();
        let stats = *sim
            .simulate_with(trace.as_bytes(), |record, outcomes| {
                let rendered: Vec<String> = outcomes.iter().map(|o| o.to_string()).collect();
                lines.push(format!("{record} {}", rendered.join(" ")));
            })
            .unwrap();
        assert_eq!(
            lines,
            vec![
                "L 10,1 miss",
                "M 20,1 miss hit",
                "L 22,1 hit",
                "S 18,1 hit",
                "L 110,1 miss eviction",
                "L 210,1 miss eviction",
                "M 12,1 miss eviction hit",
            ]
        );
        assert_eq!(stats, CacheStats { hits: 4, misses: 5, evictions: 3 });
        assert_eq!(sim.get_record_count(), 8);
    }

    #[test]
    fn malformed_line_stops_the_replay() {
        let mut sim = simulator(1, 1, 1);
        let err = sim.simulate(" L 0,1\n L 2,1\nnonsense\n L 4,1\n".as_bytes()).unwrap_err();
        assert!(matches!(err, TraceError::Malformed { line: 3, .. }));
        assert_eq!(sim.get_stats().misses, 2);
    }

    #[test]
    fn non_utf8_line_is_malformed_not_io() {
        let mut sim = simulator(1, 1, 1);
        let err = sim.simulate(&b" L 0,1\n L \xff\xfe,1\n L 4,1\n"[..]).unwrap_err();
        assert!(matches!(err, TraceError::Malformed { line: 2, .. }), "{err:?}");
        assert_eq!(sim.get_stats().misses, 1);
    }

    #[test]
    fn repeated_simulations_accumulate() {
        let mut sim = simulator(1, 1, 1);
        sim.simulate(" L 0,1\n".as_bytes()).unwrap();
        let stats = sim.simulate(" L 0,1\n".as_bytes()).unwrap();
        assert_eq!(*stats, CacheStats { hits: 1, misses: 1, evictions: 0 });
    }
}
