//! 平面 UTM 坐标到 WGS84 经纬度的逆向横轴墨卡托换算。
//! 采用 Snyder《Map Projections — A Working Manual》的级数展开，
//! 在 UTM 带内精度优于一米，足够底图请求使用。

const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// UTM 东向/北向坐标换算为（经度, 纬度），单位为度。
pub fn utm_to_lonlat(easting: f64, northing: f64, zone: u8, northern: bool) -> (f64, f64) {
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let ep2 = e2 / (1.0 - e2);

    let x = easting - FALSE_EASTING;
    let y = if northern {
        northing
    } else {
        northing - FALSE_NORTHING_SOUTH
    };

    // 子午线弧长反解出底点纬度 phi1
    let m = y / K0;
    let mu = m
        / (WGS84_A
            * (1.0 - e2 / 4.0 - 3.0 * e2 * e2 / 64.0 - 5.0 * e2 * e2 * e2 / 256.0));
    let sqrt_one_minus_e2 = (1.0 - e2).sqrt();
    let e1 = (1.0 - sqrt_one_minus_e2) / (1.0 + sqrt_one_minus_e2);
    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let sin1 = phi1.sin();
    let cos1 = phi1.cos();
    let tan1 = phi1.tan();

    let c1 = ep2 * cos1 * cos1;
    let t1 = tan1 * tan1;
    let n1 = WGS84_A / (1.0 - e2 * sin1 * sin1).sqrt();
    let r1 = WGS84_A * (1.0 - e2) / (1.0 - e2 * sin1 * sin1).powf(1.5);
    let d = x / (n1 * K0);

    let lat = phi1
        - (n1 * tan1 / r1)
            * (d * d / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                    * d.powi(6)
                    / 720.0);

    let lon0 = (f64::from(zone) * 6.0 - 183.0).to_radians();
    let lon = lon0
        + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1)
                * d.powi(5)
                / 120.0)
            / cos1;

    (lon.to_degrees(), lat.to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toronto_reference_point() {
        // UTM 17N 630084E 4833438N ≈ 43.6426°N 79.3871°W
        let (lon, lat) = utm_to_lonlat(630_084.0, 4_833_438.0, 17, true);
        assert!((lon - (-79.3871)).abs() < 1e-3, "lon = {lon}");
        assert!((lat - 43.6426).abs() < 1e-3, "lat = {lat}");
    }

    #[test]
    fn central_meridian_maps_to_zone_longitude() {
        let (lon, _) = utm_to_lonlat(500_000.0, 4_833_438.0, 17, true);
        assert!((lon - (-81.0)).abs() < 1e-9, "lon = {lon}");
        let (lon18, _) = utm_to_lonlat(500_000.0, 4_833_438.0, 18, true);
        assert!((lon18 - (-75.0)).abs() < 1e-9, "lon = {lon18}");
    }

    #[test]
    fn equator_has_zero_latitude() {
        let (_, lat) = utm_to_lonlat(500_000.0, 0.0, 17, true);
        assert!(lat.abs() < 1e-9, "lat = {lat}");
    }

    #[test]
    fn easting_increases_longitude() {
        let (west, _) = utm_to_lonlat(400_000.0, 4_800_000.0, 17, true);
        let (east, _) = utm_to_lonlat(600_000.0, 4_800_000.0, 17, true);
        assert!(east > west);
    }
}
