use std::collections::VecDeque;

use super::moving_average::Ema;

/// Relative strength index over simple-mean gains and losses.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    prev_close: Option<f64>,
    gains: VecDeque<f64>,
    losses: VecDeque<f64>,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            prev_close: None,
            gains: VecDeque::with_capacity(period),
            losses: VecDeque::with_capacity(period),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn update(&mut self, close: f64) {
        if let Some(prev) = self.prev_close {
            let change = close - prev;

            if self.gains.len() >= self.period {
                self.gains.pop_front();
                self.losses.pop_front();
            }
            self.gains.push_back(change.max(0.0));
            self.losses.push_back((-change).max(0.0));
        }
        self.prev_close = Some(close);
    }

    pub fn average_gain(&self) -> f64 {
        mean(&self.gains)
    }

    pub fn average_loss(&self) -> f64 {
        mean(&self.losses)
    }

    /// 100 whenever the loss window averages to zero, including before any change is seen.
    pub fn value(&self) -> f64 {
        let avg_loss = self.average_loss();
        if avg_loss == 0.0 {
            return 100.0;
        }

        let rs = self.average_gain() / avg_loss;
        100.0 - (100.0 / (1.0 + rs))
    }
}

#[derive(Debug, Clone)]
pub struct Macd {
    fast: Ema,
    slow: Ema,
    signal: Ema,
    macd_line: f64,
    signal_line: f64,
}

impl Macd {
    pub fn new(fast_period: usize, slow_period: usize, signal_period: usize) -> Self {
        Self {
            fast: Ema::new(fast_period),
            slow: Ema::new(slow_period),
            signal: Ema::new(signal_period),
            macd_line: 0.0,
            signal_line: 0.0,
        }
    }

    pub fn update(&mut self, close: f64) {
        self.fast.update(close);
        self.slow.update(close);
        self.macd_line = self.fast.value() - self.slow.value();

        self.signal.update(self.macd_line);
        self.signal_line = self.signal.value();
    }

    pub fn value(&self) -> f64 {
        self.macd_line
    }

    pub fn signal(&self) -> f64 {
        self.signal_line
    }

    pub fn histogram(&self) -> f64 {
        self.macd_line - self.signal_line
    }

    pub fn periods(&self) -> (usize, usize, usize) {
        (self.fast.period(), self.slow.period(), self.signal.period())
    }
}

fn mean(values: &VecDeque<f64>) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
