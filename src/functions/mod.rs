//! Functions callable from templates.
//!
//! ```text
//! add1(x)          add(x1, .., xn)     sub(a, b)
//! div(a, b)        mod(a, b)           mul(a, x1, .., xn)
//! rand(min, max)
//! get_remote(uri)  get_remote_with_config(uri, {headers: {..}})
//! ```
//!
//! A [`FunctionRegistry`] is built once at startup and registered into the
//! template environment before any template is parsed. It holds no global
//! state, so tests can swap the fetcher or pin the random seed.

pub mod math;
pub mod remote;

use minijinja::{
    Environment, Error, ErrorKind,
    value::{Rest, Value},
};
use parking_lot::Mutex;
use rand::{SeedableRng, rngs::StdRng};
use std::sync::Arc;

use math::{MathError, to_int};
use remote::{Fetch, FetchError, HttpFetcher};

/// Names of every function the registry installs.
pub const FUNCTION_NAMES: &[&str] = &[
    "add1",
    "add",
    "sub",
    "div",
    "mod",
    "mul",
    "rand",
    "get_remote",
    "get_remote_with_config",
];

/// The fixed set of helpers exposed to templates.
#[derive(Clone)]
pub struct FunctionRegistry {
    fetcher: Arc<dyn Fetch>,
    rng: Arc<Mutex<StdRng>>,
}

impl FunctionRegistry {
    /// Registry with a real HTTP fetcher and an entropy-seeded generator.
    pub fn new() -> reqwest::Result<Self> {
        Ok(Self::with_fetcher(HttpFetcher::new()?))
    }

    /// Registry that routes `get_remote*` through `fetcher`.
    pub fn with_fetcher(fetcher: impl Fetch + 'static) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            rng: Arc::new(Mutex::new(StdRng::from_entropy())),
        }
    }

    /// Make `rand` deterministic.
    #[cfg(test)]
    #[must_use]
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(StdRng::seed_from_u64(seed))),
            ..self
        }
    }

    /// Install every function into `env`.
    pub fn register(&self, env: &mut Environment<'_>) {
        env.add_function("add1", |x: Value| math::add1(to_int(&x)));
        env.add_function("add", |xs: Rest<Value>| math::add(xs.iter().map(to_int)));
        env.add_function("sub", |a: Value, b: Value| math::sub(to_int(&a), to_int(&b)));
        env.add_function("div", |a: Value, b: Value| {
            math::div(to_int(&a), to_int(&b)).map_err(math_error)
        });
        env.add_function("mod", |a: Value, b: Value| {
            math::rem(to_int(&a), to_int(&b)).map_err(math_error)
        });
        env.add_function("mul", |a: Value, xs: Rest<Value>| {
            math::mul(to_int(&a), xs.iter().map(to_int))
        });

        let rng = Arc::clone(&self.rng);
        env.add_function("rand", move |min: Value, max: Value| {
            math::rand_range(&mut *rng.lock(), to_int(&min), to_int(&max)).map_err(math_error)
        });

        let fetcher = Arc::clone(&self.fetcher);
        env.add_function("get_remote", move |uri: String| {
            remote::get_remote(&*fetcher, &uri).map_err(fetch_error)
        });

        let fetcher = Arc::clone(&self.fetcher);
        env.add_function("get_remote_with_config", move |uri: String, config: Value| {
            remote::get_remote_with_config(&*fetcher, &uri, &config).map_err(fetch_error)
        });
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &FUNCTION_NAMES)
            .finish_non_exhaustive()
    }
}

fn math_error(e: MathError) -> Error {
    Error::new(ErrorKind::InvalidOperation, e.to_string())
}

fn fetch_error(e: FetchError) -> Error {
    Error::new(ErrorKind::InvalidOperation, "get_remote failed").with_source(e)
}
