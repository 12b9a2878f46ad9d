// src/utils/pricing.rs

/// Server-authoritative fare table. The client's submitted price is never
/// trusted; every trip is priced through here at creation.
#[derive(Debug, Clone, Copy)]
pub struct PriceTable {
    pub min_fare_ils: i64,
    pub rate_per_km: f64,
}

impl Default for PriceTable {
    fn default() -> Self {
        Self {
            min_fare_ils: 5,
            rate_per_km: 0.5,
        }
    }
}

impl PriceTable {
    /// `price(d) = max(minFare, ceil(ceil_to_0.1km(d) * rate))`.
    ///
    /// Distance is rounded up to the nearest 0.1 km first, then priced, then
    /// rounded up to whole ILS. Rounding to decimeters goes through
    /// `d * 10.0` rather than `d / 0.1`; the latter overshoots the integer
    /// for inputs like 15.3 and would bill an extra decimeter.
    pub fn price(&self, distance_km: f64) -> i64 {
        if !distance_km.is_finite() || distance_km <= 0.0 {
            return self.min_fare_ils;
        }
        let decimeters = (distance_km * 10.0).ceil();
        let raw = decimeters * 0.1 * self.rate_per_km;
        let fare = raw.ceil() as i64;
        fare.max(self.min_fare_ils)
    }
}
