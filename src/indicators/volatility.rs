use std::collections::VecDeque;

use super::moving_average::Sma;
use crate::market::Candle;

#[derive(Debug, Clone)]
pub struct BollingerBands {
    k: f64,
    sma: Sma,
}

impl BollingerBands {
    pub fn new(period: usize, k: f64) -> Self {
        Self {
            k,
            sma: Sma::new(period),
        }
    }

    pub fn period(&self) -> usize {
        self.sma.period()
    }

    pub fn update(&mut self, close: f64) {
        self.sma.update(close);
    }

    pub fn middle(&self) -> f64 {
        self.sma.value()
    }

    pub fn upper(&self) -> f64 {
        self.middle() + self.k * self.std_dev()
    }

    pub fn lower(&self) -> f64 {
        self.middle() - self.k * self.std_dev()
    }

    /// Population standard deviation over the SMA window.
    pub fn std_dev(&self) -> f64 {
        let window = self.sma.window();
        if window.is_empty() {
            return 0.0;
        }

        let mean = self.sma.value();
        let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / window.len() as f64;
        variance.sqrt()
    }
}

/// Average true range as a rolling mean; the first bar only seeds the previous close.
#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    prev_close: Option<f64>,
    true_ranges: VecDeque<f64>,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            prev_close: None,
            true_ranges: VecDeque::with_capacity(period),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn update(&mut self, candle: &Candle) {
        if let Some(prev) = self.prev_close {
            let true_range = (candle.high - candle.low)
                .max((candle.high - prev).abs())
                .max((candle.low - prev).abs());

            if self.true_ranges.len() >= self.period {
                self.true_ranges.pop_front();
            }
            self.true_ranges.push_back(true_range);
        }
        self.prev_close = Some(candle.close);
    }

    pub fn value(&self) -> f64 {
        if self.true_ranges.is_empty() {
            return 0.0;
        }
        self.true_ranges.iter().sum::<f64>() / self.true_ranges.len() as f64
    }
}
