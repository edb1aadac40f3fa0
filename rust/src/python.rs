//! PyO3 bindings, built with `--features python` (e.g. via maturin).
//!
//! Results cross the boundary as plain dicts/lists; projection series are
//! additionally exposed as NumPy arrays under the `"series"` key.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use numpy::{IntoPyArray, PyArray1, PyReadonlyArray1};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};
use serde::Serialize;
use serde_json::Value;

use crate::config::EngineConfig;
use crate::decay::rank_decay_weights;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::optimizer::ChannelConstraint;
use crate::projection::SeriesMetric;

/// Python module definition
#[pymodule]
fn funnelcast_core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyEngine>()?;
    m.add_function(wrap_pyfunction!(rank_decay_weights_rust, m)?)?;
    Ok(())
}

fn to_py_err(err: EngineError) -> PyErr {
    PyValueError::new_err(format!("[{}] {}", err.kind(), err))
}

fn json_to_py(py: Python<'_>, value: &Value) -> PyResult<PyObject> {
    Ok(match value {
        Value::Null => py.None(),
        Value::Bool(b) => b.to_object(py),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_object(py)
            } else if let Some(u) = n.as_u64() {
                u.to_object(py)
            } else {
                n.as_f64().unwrap_or(f64::NAN).to_object(py)
            }
        }
        Value::String(s) => s.to_object(py),
        Value::Array(items) => {
            let items = items
                .iter()
                .map(|v| json_to_py(py, v))
                .collect::<PyResult<Vec<_>>>()?;
            PyList::new(py, items).to_object(py)
        }
        Value::Object(map) => {
            let dict = PyDict::new(py);
            for (k, v) in map {
                dict.set_item(k, json_to_py(py, v)?)?;
            }
            dict.to_object(py)
        }
    })
}

fn to_py<T: Serialize>(py: Python<'_>, value: &T) -> PyResult<PyObject> {
    let json = serde_json::to_value(value).map_err(|e| PyValueError::new_err(e.to_string()))?;
    json_to_py(py, &json)
}

/// Budget allocation and growth projection engine.
#[pyclass(name = "Engine")]
pub struct PyEngine {
    engine: Engine,
}

#[pymethods]
impl PyEngine {
    #[new]
    #[pyo3(signature = (config_path = None))]
    fn new(config_path: Option<String>) -> PyResult<Self> {
        let config = match config_path {
            Some(path) => EngineConfig::load(Path::new(&path)).map_err(to_py_err)?,
            None => EngineConfig::default(),
        };
        let engine = Engine::new(config).map_err(to_py_err)?;
        Ok(Self { engine })
    }

    /// Expected ROI of spending `budget` on `channel`.
    #[pyo3(signature = (channel, budget, duration_months = 3))]
    fn estimate(
        &self,
        py: Python,
        channel: &str,
        budget: f64,
        duration_months: u32,
    ) -> PyResult<PyObject> {
        let result = self
            .engine
            .estimate(channel, budget, duration_months)
            .map_err(to_py_err)?;
        to_py(py, &result)
    }

    /// Allocate `total_budget`; constraints map channel -> (min_pct, max_pct).
    #[pyo3(signature = (total_budget, channels, constraints = None))]
    fn optimize(
        &self,
        py: Python,
        total_budget: f64,
        channels: Vec<String>,
        constraints: Option<HashMap<String, (f64, f64)>>,
    ) -> PyResult<PyObject> {
        let constraints: Option<BTreeMap<String, ChannelConstraint>> = constraints.map(|c| {
            c.into_iter()
                .map(|(channel, bounds)| (channel, ChannelConstraint::from(bounds)))
                .collect()
        });
        let plan = self
            .engine
            .optimize(total_budget, &channels, constraints.as_ref())
            .map_err(to_py_err)?;
        to_py(py, &plan)
    }

    /// Month-by-month projection; `channel_mix` shares must sum to 1.
    #[pyo3(signature = (monthly_budget, duration_months = 12, channel_mix = None))]
    fn project(
        &self,
        py: Python,
        monthly_budget: f64,
        duration_months: u32,
        channel_mix: Option<HashMap<String, f64>>,
    ) -> PyResult<PyObject> {
        let mix: Option<BTreeMap<String, f64>> = channel_mix.map(|m| m.into_iter().collect());
        let report = self
            .engine
            .project(monthly_budget, duration_months, mix.as_ref())
            .map_err(to_py_err)?;

        let series = PyDict::new(py);
        for metric in SeriesMetric::ALL {
            series.set_item(metric.name(), report.column(metric).into_pyarray(py))?;
        }
        let out = to_py(py, &report)?;
        out.as_ref(py).downcast::<PyDict>()?.set_item("series", series)?;
        Ok(out)
    }

    fn channels(&self) -> Vec<String> {
        self.engine.benchmarks().channel_ids()
    }

    /// Return (entries, capacity, hits, misses), or None when caching is off.
    fn cache_stats(&self) -> Option<(usize, usize, u64, u64)> {
        self.engine
            .cache_stats()
            .map(|s| (s.entries, s.capacity, s.hits, s.misses))
    }
}

/// Score-scaled geometric decay weights for a ranked score vector.
#[pyfunction]
#[pyo3(signature = (scores, base = 0.7))]
fn rank_decay_weights_rust(
    py: Python,
    scores: PyReadonlyArray1<f64>,
    base: f64,
) -> Py<PyArray1<f64>> {
    let scores = scores.as_array();
    rank_decay_weights(&scores, base).into_pyarray(py).to_owned()
}
