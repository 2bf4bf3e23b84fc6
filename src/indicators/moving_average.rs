use std::collections::VecDeque;

/// Arithmetic mean of the last `period` closes.
#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    window: VecDeque<f64>,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            window: VecDeque::with_capacity(period),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn update(&mut self, close: f64) {
        if self.window.len() >= self.period {
            self.window.pop_front();
        }
        self.window.push_back(close);
    }

    /// Mean of everything seen so far until the window fills; 0 before any sample.
    pub fn value(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.window.iter().sum::<f64>() / self.window.len() as f64
    }

    pub fn window(&self) -> &VecDeque<f64> {
        &self.window
    }
}

/// Exponential moving average seeded with the first close.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    alpha: f64,
    history: VecDeque<f64>,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            alpha: 2.0 / (period as f64 + 1.0),
            history: VecDeque::with_capacity(period),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn update(&mut self, value: f64) {
        let next = match self.history.back() {
            Some(prev) => self.alpha * value + (1.0 - self.alpha) * prev,
            None => value,
        };

        if self.history.len() >= self.period {
            self.history.pop_front();
        }
        self.history.push_back(next);
    }

    pub fn value(&self) -> f64 {
        self.history.back().copied().unwrap_or(0.0)
    }

    pub fn is_seeded(&self) -> bool {
        !self.history.is_empty()
    }
}
