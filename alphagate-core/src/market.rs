//! Market data — aligned OHLCV columns for sandbox execution and backtests.
//!
//! The gate never downloads anything: callers supply a `MarketFrame`, and
//! tests/CLI use `MarketFrame::synthetic`, a seeded random walk with
//! alternating bull/bear/sideways phases so regime checks are non-trivial.

use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Aligned daily OHLCV series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketFrame {
    pub dates: Vec<NaiveDate>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
}

impl MarketFrame {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Column lookup for `data["close"]`-style access in candidate code.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        match name {
            "open" => Some(&self.open),
            "high" => Some(&self.high),
            "low" => Some(&self.low),
            "close" => Some(&self.close),
            "volume" => Some(&self.volume),
            _ => None,
        }
    }

    /// Slice to a bar index range `[start, end)`, clamped to the data.
    pub fn slice(&self, start: usize, end: usize) -> MarketFrame {
        let end = end.min(self.len());
        let start = start.min(end);
        MarketFrame {
            dates: self.dates[start..end].to_vec(),
            open: self.open[start..end].to_vec(),
            high: self.high[start..end].to_vec(),
            low: self.low[start..end].to_vec(),
            close: self.close[start..end].to_vec(),
            volume: self.volume[start..end].to_vec(),
        }
    }

    /// Seeded synthetic frame: geometric random walk whose drift cycles
    /// through bull, bear, and sideways phases every 63 bars (one quarter).
    pub fn synthetic(seed: u64, n_bars: usize) -> MarketFrame {
        let mut rng = StdRng::seed_from_u64(seed);
        let start = NaiveDate::from_ymd_opt(2018, 1, 2).expect("valid date");

        let mut dates = Vec::with_capacity(n_bars);
        let mut open = Vec::with_capacity(n_bars);
        let mut high = Vec::with_capacity(n_bars);
        let mut low = Vec::with_capacity(n_bars);
        let mut close = Vec::with_capacity(n_bars);
        let mut volume = Vec::with_capacity(n_bars);

        let mut price = 100.0_f64;
        let mut date = start;
        for i in 0..n_bars {
            // Phase drift: bull +8 bps/day, bear -6, sideways 0.
            let drift = match (i / 63) % 3 {
                0 => 0.0008,
                1 => -0.0006,
                _ => 0.0,
            };
            let shock: f64 = rng.gen_range(-0.012..0.012);
            let ret = drift + shock;
            let o = price;
            price *= 1.0 + ret;
            let c = price;
            let spread = price * rng.gen_range(0.001..0.008);
            high.push(o.max(c) + spread);
            low.push((o.min(c) - spread).max(0.01));
            open.push(o);
            close.push(c);
            volume.push(rng.gen_range(500_000.0..5_000_000.0));
            dates.push(date);
            // Skip weekends.
            date = date.succ_opt().expect("date overflow");
            while date.weekday().number_from_monday() > 5 {
                date = date.succ_opt().expect("date overflow");
            }
        }

        MarketFrame {
            dates,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Daily close-to-close returns; first element is 0.
    pub fn returns(&self) -> Vec<f64> {
        let mut out = vec![0.0; self.len()];
        for i in 1..self.len() {
            if self.close[i - 1] > 0.0 {
                out[i] = self.close[i] / self.close[i - 1] - 1.0;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_is_deterministic_per_seed() {
        let a = MarketFrame::synthetic(42, 100);
        let b = MarketFrame::synthetic(42, 100);
        assert_eq!(a.close, b.close);

        let c = MarketFrame::synthetic(43, 100);
        assert_ne!(a.close, c.close);
    }

    #[test]
    fn synthetic_has_sane_ohlc() {
        let frame = MarketFrame::synthetic(7, 252);
        assert_eq!(frame.len(), 252);
        for i in 0..frame.len() {
            assert!(frame.high[i] >= frame.open[i].max(frame.close[i]));
            assert!(frame.low[i] <= frame.open[i].min(frame.close[i]));
            assert!(frame.low[i] > 0.0);
        }
    }

    #[test]
    fn no_weekend_dates() {
        let frame = MarketFrame::synthetic(1, 500);
        for d in &frame.dates {
            assert!(d.weekday().number_from_monday() <= 5, "weekend date {d}");
        }
    }

    #[test]
    fn column_lookup() {
        let frame = MarketFrame::synthetic(1, 10);
        assert!(frame.column("close").is_some());
        assert!(frame.column("vwap").is_none());
    }

    #[test]
    fn slice_clamps() {
        let frame = MarketFrame::synthetic(1, 50);
        let sliced = frame.slice(40, 100);
        assert_eq!(sliced.len(), 10);
        assert_eq!(sliced.close[0], frame.close[40]);
    }

    #[test]
    fn returns_length_matches() {
        let frame = MarketFrame::synthetic(1, 30);
        let rets = frame.returns();
        assert_eq!(rets.len(), 30);
        assert_eq!(rets[0], 0.0);
    }
}
