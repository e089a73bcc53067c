// Copyright 2015-2020 Parity Technologies (UK) Ltd.
// This file is part of OpenEthereum.

// OpenEthereum is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// OpenEthereum is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with OpenEthereum.  If not, see <http://www.gnu.org/licenses/>.

//! Prometheus metrics plumbing for the storage containers.

pub extern crate prometheus;

pub struct PrometheusRegistry {
    prefix: String,
    registry: prometheus::Registry,
}

impl PrometheusRegistry {
    /// Create a new instance with the specified prefix
    pub fn new(prefix: String) -> Self {
        Self {
            prefix,
            registry: prometheus::Registry::new(),
        }
    }

    /// Get internal registry
    pub fn registry(&self) -> &prometheus::Registry {
        &self.registry
    }

    /// Adds a new prometheus counter with the specified value
    pub fn register_counter(&mut self, name: &str, help: &str, value: u64) {
        let name = format!("{}{}", self.prefix, name);
        let c = prometheus::IntCounter::new(name.as_str(), help)
            .expect("name and help must be non-empty");
        c.inc_by(value);
        self.registry
            .register(Box::new(c))
            .expect("prometheus identifiers must be unique");
    }

    /// Adds a new prometheus gauge with the specified value
    pub fn register_gauge(&mut self, name: &str, help: &str, value: i64) {
        let name = format!("{}{}", self.prefix, name);
        let g = prometheus::IntGauge::new(name.as_str(), help)
            .expect("name and help must be non-empty");
        g.set(value);
        self.registry
            .register(Box::new(g))
            .expect("prometheus identifiers must be unique");
    }
}

/// Implemented by containers that publish operational counters, e.g. the
/// hit/miss tracking cache.
pub trait PrometheusMetrics {
    fn prometheus_metrics(&self, registry: &mut PrometheusRegistry);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_gathered_with_prefix() {
        let mut reg = PrometheusRegistry::new("cache_".into());
        reg.register_counter("hits", "cache hits", 7);
        reg.register_gauge("capacity", "cache capacity", 128);
        let families = reg.registry().gather();
        let names: Vec<_> = families.iter().map(|f| f.get_name().to_string()).collect();
        assert!(names.contains(&"cache_hits".to_string()));
        assert!(names.contains(&"cache_capacity".to_string()));
    }
}
