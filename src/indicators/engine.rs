use super::moving_average::{Ema, Sma};
use super::order_book::OrderBookMetrics;
use super::oscillators::{Macd, Rsi};
use super::volatility::{Atr, BollingerBands};
use crate::market::{Candle, OrderBook};

pub const ORDER_BOOK_FEATURES: [&str; 3] = ["SPREAD", "IMBALANCE", "SLIPPAGE"];

/// Indicator outputs plus order book metrics.
pub const ENGINE_FEATURE_COUNT: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorConfig {
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bb_period: usize,
    pub bb_std_dev: f64,
    pub atr_period: usize,
    pub sma_periods: [usize; 3],
    pub ema_periods: [usize; 2],
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bb_period: 20,
            bb_std_dev: 2.0,
            atr_period: 14,
            sma_periods: [20, 50, 200],
            ema_periods: [12, 26],
        }
    }
}

/// The closed set of technical indicators the engine knows how to drive.
#[derive(Debug, Clone)]
pub enum Indicator {
    Sma(Sma),
    Ema(Ema),
    Rsi(Rsi),
    Macd(Macd),
    BollingerBands(BollingerBands),
    Atr(Atr),
}

impl Indicator {
    pub fn update(&mut self, candle: &Candle) {
        match self {
            Indicator::Sma(sma) => sma.update(candle.close),
            Indicator::Ema(ema) => ema.update(candle.close),
            Indicator::Rsi(rsi) => rsi.update(candle.close),
            Indicator::Macd(macd) => macd.update(candle.close),
            Indicator::BollingerBands(bb) => bb.update(candle.close),
            Indicator::Atr(atr) => atr.update(candle),
        }
    }

    /// Headline value: MACD line for MACD, middle band for Bollinger.
    pub fn value(&self) -> f64 {
        match self {
            Indicator::Sma(sma) => sma.value(),
            Indicator::Ema(ema) => ema.value(),
            Indicator::Rsi(rsi) => rsi.value(),
            Indicator::Macd(macd) => macd.value(),
            Indicator::BollingerBands(bb) => bb.middle(),
            Indicator::Atr(atr) => atr.value(),
        }
    }

    pub fn name(&self) -> String {
        match self {
            Indicator::Sma(sma) => format!("SMA{}", sma.period()),
            Indicator::Ema(ema) => format!("EMA{}", ema.period()),
            Indicator::Rsi(_) => "RSI".to_string(),
            Indicator::Macd(_) => "MACD".to_string(),
            Indicator::BollingerBands(_) => "BB".to_string(),
            Indicator::Atr(_) => "ATR".to_string(),
        }
    }

    fn push_outputs(&self, out: &mut Vec<f64>) {
        match self {
            Indicator::Macd(macd) => {
                out.extend([macd.value(), macd.signal(), macd.histogram()]);
            }
            Indicator::BollingerBands(bb) => {
                out.extend([bb.upper(), bb.middle(), bb.lower()]);
            }
            other => out.push(other.value()),
        }
    }

    fn output_names(&self) -> Vec<String> {
        match self {
            Indicator::Macd(_) => vec!["MACD".into(), "MACD_SIGNAL".into(), "MACD_HIST".into()],
            Indicator::BollingerBands(_) => {
                vec!["BB_UPPER".into(), "BB_MIDDLE".into(), "BB_LOWER".into()]
            }
            other => vec![other.name()],
        }
    }
}

/// Drives every configured indicator from the same candle stream and keeps the
/// microstructure figures of the latest book.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    indicators: Vec<Indicator>,
    order_book: OrderBookMetrics,
    candles_seen: u64,
}

impl IndicatorEngine {
    pub fn new(config: &IndicatorConfig) -> Self {
        // Order here is the feature vector order.
        let mut indicators = vec![
            Indicator::Rsi(Rsi::new(config.rsi_period)),
            Indicator::Macd(Macd::new(config.macd_fast, config.macd_slow, config.macd_signal)),
            Indicator::BollingerBands(BollingerBands::new(config.bb_period, config.bb_std_dev)),
            Indicator::Atr(Atr::new(config.atr_period)),
        ];
        indicators.extend(config.sma_periods.iter().map(|&p| Indicator::Sma(Sma::new(p))));
        indicators.extend(config.ema_periods.iter().map(|&p| Indicator::Ema(Ema::new(p))));

        Self {
            indicators,
            order_book: OrderBookMetrics::default(),
            candles_seen: 0,
        }
    }

    pub fn update(&mut self, candle: &Candle) {
        for indicator in self.indicators.iter_mut() {
            indicator.update(candle);
        }
        self.candles_seen += 1;
    }

    pub fn update_order_book(&mut self, book: &OrderBook) {
        self.order_book = OrderBookMetrics::from_book(book);
    }

    pub fn candles_seen(&self) -> u64 {
        self.candles_seen
    }

    pub fn indicators(&self) -> &[Indicator] {
        &self.indicators
    }

    /// `[RSI, MACD, MACD_SIGNAL, MACD_HIST, BB_UPPER, BB_MIDDLE, BB_LOWER, ATR,
    /// SMA.., EMA.., SPREAD, IMBALANCE, SLIPPAGE]`
    pub fn feature_vector(&self) -> Vec<f64> {
        let mut features = Vec::with_capacity(ENGINE_FEATURE_COUNT);
        for indicator in &self.indicators {
            indicator.push_outputs(&mut features);
        }
        features.extend([
            self.order_book.spread,
            self.order_book.imbalance,
            self.order_book.slippage_estimate,
        ]);
        features
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.indicators
            .iter()
            .flat_map(|i| i.output_names())
            .chain(ORDER_BOOK_FEATURES.iter().map(|n| n.to_string()))
            .collect()
    }

    pub fn indicator_value(&self, name: &str) -> Option<f64> {
        let index = self.feature_names().iter().position(|n| n == name)?;
        self.feature_vector().get(index).copied()
    }

    pub fn rsi(&self) -> f64 {
        self.find(|i| match i {
            Indicator::Rsi(rsi) => Some(rsi.value()),
            _ => None,
        })
    }

    pub fn macd(&self) -> f64 {
        self.find(|i| match i {
            Indicator::Macd(macd) => Some(macd.value()),
            _ => None,
        })
    }

    pub fn macd_signal(&self) -> f64 {
        self.find(|i| match i {
            Indicator::Macd(macd) => Some(macd.signal()),
            _ => None,
        })
    }

    pub fn macd_histogram(&self) -> f64 {
        self.find(|i| match i {
            Indicator::Macd(macd) => Some(macd.histogram()),
            _ => None,
        })
    }

    pub fn bb_upper(&self) -> f64 {
        self.find(|i| match i {
            Indicator::BollingerBands(bb) => Some(bb.upper()),
            _ => None,
        })
    }

    pub fn bb_middle(&self) -> f64 {
        self.find(|i| match i {
            Indicator::BollingerBands(bb) => Some(bb.middle()),
            _ => None,
        })
    }

    pub fn bb_lower(&self) -> f64 {
        self.find(|i| match i {
            Indicator::BollingerBands(bb) => Some(bb.lower()),
            _ => None,
        })
    }

    pub fn atr(&self) -> f64 {
        self.find(|i| match i {
            Indicator::Atr(atr) => Some(atr.value()),
            _ => None,
        })
    }

    /// `None` when no SMA with that period is configured.
    pub fn sma(&self, period: usize) -> Option<f64> {
        self.indicators.iter().find_map(|i| match i {
            Indicator::Sma(sma) if sma.period() == period => Some(sma.value()),
            _ => None,
        })
    }

    pub fn ema(&self, period: usize) -> Option<f64> {
        self.indicators.iter().find_map(|i| match i {
            Indicator::Ema(ema) if ema.period() == period => Some(ema.value()),
            _ => None,
        })
    }

    pub fn spread(&self) -> f64 {
        self.order_book.spread
    }

    pub fn imbalance(&self) -> f64 {
        self.order_book.imbalance
    }

    pub fn slippage_estimate(&self) -> f64 {
        self.order_book.slippage_estimate
    }

    pub fn order_book_metrics(&self) -> OrderBookMetrics {
        self.order_book
    }

    fn find(&self, pick: impl Fn(&Indicator) -> Option<f64>) -> f64 {
        self.indicators.iter().find_map(pick).unwrap_or(0.0)
    }
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self::new(&IndicatorConfig::default())
    }
}
