//! Calculator service: one handler per call pattern, each backed by a
//! per-call accumulator with no state shared across calls.

use async_stream::stream;
use futures::StreamExt;
use rpcflow_lite::{RequestStream, RpcRouter, RpcServerError, Status};

use crate::proto::calculator::{
    ComputeAverageRequest, ComputeAverageResponse, FindMaximumRequest, FindMaximumResponse,
    PrimeNumberDecompositionRequest, PrimeNumberDecompositionResponse, SquareRootRequest,
    SquareRootResponse, SumRequest, SumResponse,
};

pub const SERVICE: &str = "calculator.CalculatorService";

pub const SUM: &str = "calculator.CalculatorService/Sum";
pub const PRIME_NUMBER_DECOMPOSITION: &str =
    "calculator.CalculatorService/PrimeNumberDecomposition";
pub const COMPUTE_AVERAGE: &str = "calculator.CalculatorService/ComputeAverage";
pub const FIND_MAXIMUM: &str = "calculator.CalculatorService/FindMaximum";
pub const SQUARE_ROOT: &str = "calculator.CalculatorService/SquareRoot";

/// Prime factors of a number, in ascending order with multiplicity.
///
/// Strips factors of 2 first, then tests odd candidates while their square
/// does not exceed what remains; whatever is left above 1 is itself prime
/// and comes out last. Numbers below 2 have no factors.
#[derive(Debug)]
pub struct PrimeFactors {
    remaining: i64,
    candidate: i64,
}

impl PrimeFactors {
    pub fn of(number: i64) -> Self {
        Self {
            remaining: number,
            candidate: 2,
        }
    }
}

impl Iterator for PrimeFactors {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        if self.remaining <= 1 {
            return None;
        }
        if self.candidate == 2 {
            if self.remaining % 2 == 0 {
                self.remaining /= 2;
                return Some(2);
            }
            self.candidate = 3;
        }
        // Division keeps candidate * candidate from overflowing.
        while self.candidate <= self.remaining / self.candidate {
            if self.remaining % self.candidate == 0 {
                self.remaining /= self.candidate;
                return Some(self.candidate);
            }
            self.candidate += 2;
        }
        let last = self.remaining;
        self.remaining = 1;
        Some(last)
    }
}

/// Running total and count for a client-streaming average.
#[derive(Debug, Default)]
pub struct AverageAccumulator {
    total: f64,
    count: u64,
}

impl AverageAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, value: f64) {
        self.total += value;
        self.count += 1;
    }

    /// The mean of everything recorded. An empty stream has no defined
    /// average and is rejected rather than producing 0/0.
    pub fn finish(self) -> Result<f64, Status> {
        if self.count == 0 {
            return Err(Status::invalid_argument(
                "cannot compute the average of an empty stream",
            ));
        }
        Ok(self.total / self.count as f64)
    }
}

/// Running maximum for a bidi stream.
///
/// The first value establishes the baseline without an emission; every
/// strictly greater value afterwards updates the maximum and reports it.
#[derive(Debug, Default)]
pub struct MaximumTracker {
    current: Option<i32>,
}

impl MaximumTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one value; returns the new maximum if this value raised it.
    pub fn observe(&mut self, value: i32) -> Option<i32> {
        match self.current {
            None => {
                self.current = Some(value);
                None
            }
            Some(max) if value > max => {
                self.current = Some(value);
                Some(value)
            }
            Some(_) => None,
        }
    }

    pub fn current(&self) -> Option<i32> {
        self.current
    }
}

/// Floating-point square root of a non-negative integer.
pub fn square_root(number: i32) -> Result<f64, Status> {
    if number < 0 {
        return Err(Status::invalid_argument(format!(
            "received a negative number: {number}"
        )));
    }
    Ok(f64::from(number).sqrt())
}

/// Register every calculator method on the router.
pub fn register(router: &mut RpcRouter) -> Result<(), RpcServerError> {
    router.register_unary(SUM, |_ctx, req: SumRequest| async move {
        Ok(SumResponse {
            result: req.number_1 + req.number_2,
        })
    })?;

    router.register_server_stream(
        PRIME_NUMBER_DECOMPOSITION,
        |_ctx, req: PrimeNumberDecompositionRequest| async move {
            tracing::info!(number = req.number, "decomposing into prime factors");
            let factors = PrimeFactors::of(req.number);
            Ok(stream! {
                for number in factors {
                    yield Ok(PrimeNumberDecompositionResponse { number });
                }
            })
        },
    )?;

    router.register_client_stream(
        COMPUTE_AVERAGE,
        |_ctx, mut requests: RequestStream<ComputeAverageRequest>| async move {
            let mut accumulator = AverageAccumulator::new();
            while let Some(req) = requests.next().await {
                accumulator.record(req.number);
            }
            let result = accumulator.finish()?;
            Ok(ComputeAverageResponse { result })
        },
    )?;

    router.register_bidi(
        FIND_MAXIMUM,
        |_ctx, mut requests: RequestStream<FindMaximumRequest>| async move {
            Ok(stream! {
                let mut tracker = MaximumTracker::new();
                while let Some(req) = requests.next().await {
                    if let Some(result) = tracker.observe(req.number) {
                        yield Ok(FindMaximumResponse { result });
                    }
                }
            })
        },
    )?;

    router.register_unary(SQUARE_ROOT, |_ctx, req: SquareRootRequest| async move {
        let result = square_root(req.number)?;
        Ok(SquareRootResponse { result })
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_prime(n: i64) -> bool {
        if n < 2 {
            return false;
        }
        let mut i = 2;
        while i <= n / i {
            if n % i == 0 {
                return false;
            }
            i += 1;
        }
        true
    }

    #[test]
    fn test_prime_factors_of_120() {
        let factors: Vec<i64> = PrimeFactors::of(120).collect();
        assert_eq!(factors, vec![2, 2, 2, 3, 5]);
    }

    #[test]
    fn test_prime_factors_multiply_back_and_are_prime() {
        for n in 2..500 {
            let factors: Vec<i64> = PrimeFactors::of(n).collect();
            assert_eq!(factors.iter().product::<i64>(), n, "product mismatch for {n}");
            assert!(factors.iter().all(|&f| is_prime(f)), "non-prime factor for {n}");
            let mut sorted = factors.clone();
            sorted.sort_unstable();
            assert_eq!(factors, sorted, "factors out of order for {n}");
        }
    }

    #[test]
    fn test_prime_factors_below_two_are_empty() {
        assert_eq!(PrimeFactors::of(0).count(), 0);
        assert_eq!(PrimeFactors::of(1).count(), 0);
    }

    #[test]
    fn test_prime_factors_of_a_prime_is_itself() {
        let factors: Vec<i64> = PrimeFactors::of(97).collect();
        assert_eq!(factors, vec![97]);
    }

    #[test]
    fn test_average_accumulator() {
        let mut acc = AverageAccumulator::new();
        for value in [1.0, 2.0, 3.0, 4.0] {
            acc.record(value);
        }
        assert!((acc.finish().unwrap() - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_average_of_empty_stream_is_rejected() {
        let acc = AverageAccumulator::new();
        let err = acc.finish().unwrap_err();
        assert_eq!(err.code(), rpcflow_lite::Code::InvalidArgument);
    }

    #[test]
    fn test_maximum_tracker_emits_only_new_maxima() {
        let mut tracker = MaximumTracker::new();
        let emitted: Vec<i32> = [1, 5, 3, 6, 2, 20]
            .into_iter()
            .filter_map(|value| tracker.observe(value))
            .collect();
        assert_eq!(emitted, vec![5, 6, 20]);
        assert_eq!(tracker.current(), Some(20));
    }

    #[test]
    fn test_maximum_tracker_first_value_sets_baseline_silently() {
        let mut tracker = MaximumTracker::new();
        assert_eq!(tracker.observe(7), None);
        assert_eq!(tracker.observe(7), None);
        assert_eq!(tracker.observe(8), Some(8));
    }

    #[test]
    fn test_square_root() {
        assert!((square_root(10).unwrap() - 10f64.sqrt()).abs() < f64::EPSILON);
        assert_eq!(square_root(0).unwrap(), 0.0);
    }

    #[test]
    fn test_square_root_of_negative_is_invalid() {
        let err = square_root(-2).unwrap_err();
        assert_eq!(err.code(), rpcflow_lite::Code::InvalidArgument);
        assert!(err.message().contains("-2"));
    }
}
