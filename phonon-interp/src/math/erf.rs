// Error function and complementary error function, adapted from the Cephes
// mathematical library (ndtr.c, Stephen L. Moshier)

const T: [f64; 5] = [
    9.60497373987051638749E0,
    9.00260197203842689217E1,
    2.23200534594684319226E3,
    7.00332514112805075473E3,
    5.55923013010394962768E4,
];

const U: [f64; 5] = [
    3.35617141647503099647E1,
    5.21357949780152679795E2,
    4.59432382970980127987E3,
    2.26290000613890934246E4,
    4.92673942608635921086E4,
];

const P: [f64; 9] = [
    2.46196981473530512524E-10,
    5.64189564831068821977E-1,
    7.46321056442269912687E0,
    4.86371970985681366614E1,
    1.96520832956077098242E2,
    5.26445194995477358631E2,
    9.34528527171957607540E2,
    1.02755188689515710272E3,
    5.57535335369399327526E2,
];

const Q: [f64; 8] = [
    1.32281951154744992508E1,
    8.67072140885989742329E1,
    3.54937778887819891062E2,
    9.75708501743205489753E2,
    1.82390916687909736289E3,
    2.24633760818710981792E3,
    1.65666309194161350182E3,
    5.57535340817727675546E2,
];

const R: [f64; 6] = [
    5.64189583547755073984E-1,
    1.27536670759978104416E0,
    5.01905042251180477414E0,
    6.16021097993053585195E0,
    7.40974269950448939160E0,
    2.97886665372100240670E0,
];

const S: [f64; 6] = [
    2.26052863220117276590E0,
    9.39603524938001434673E0,
    1.20489539808096656605E1,
    1.70814450747565897222E1,
    9.60896809063285878198E0,
    3.36907645100081516050E0,
];

/// Evaluate the polynomial with the given `coefficients` (highest degree
/// first) at `x`
#[inline]
fn polevl(x: f64, coefficients: &[f64]) -> f64 {
    coefficients.iter().fold(0.0, |acc, &c| acc * x + c)
}

/// Same as `polevl`, with an implicit leading coefficient of 1
#[inline]
fn p1evl(x: f64, coefficients: &[f64]) -> f64 {
    coefficients.iter().fold(1.0, |acc, &c| acc * x + c)
}

/// Error function, `erf(x) = 2/sqrt(π) ∫_0^x exp(-t^2) dt`
pub fn erf(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }

    if x.abs() > 1.0 {
        return 1.0 - erfc(x);
    }

    let z = x * x;
    return x * polevl(z, &T) / p1evl(z, &U);
}

/// Complementary error function, `erfc(x) = 1 - erf(x)`, accurate for large
/// arguments where `1 - erf(x)` would cancel.
pub fn erfc(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }

    let a = x.abs();
    if a < 1.0 {
        return 1.0 - erf(x);
    }

    let z = -x * x;
    if z < -7.09782712893383996843E2 {
        // underflow
        return if x < 0.0 { 2.0 } else { 0.0 };
    }

    let z = z.exp();
    let (p, q) = if a < 8.0 {
        (polevl(a, &P), p1evl(a, &Q))
    } else {
        (polevl(a, &R), p1evl(a, &S))
    };

    let y = z * p / q;
    if x < 0.0 {
        return 2.0 - y;
    }
    return y;
}
