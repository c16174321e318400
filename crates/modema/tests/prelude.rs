//! Facade smoke tests through the prelude.

use std::f64::consts::PI;

use approx::assert_relative_eq;
use modema::prelude::*;

#[test]
fn test_known_pole_round_trip() {
    let (fr, xi) = (80.0, 0.03);
    let wn = 2.0 * PI * fr;
    let pole = Complex64::new(-xi * wn, wn * (1.0 - xi * xi).sqrt());

    let (f, x) = complex_freq_to_freq_and_damp(pole);
    assert_relative_eq!(f, fr, max_relative = 1e-12);
    assert_relative_eq!(x, xi, max_relative = 1e-12);

    let freq: Vec<f64> = (0..=300).map(|i| i as f64).collect();
    let frf = DMatrix::from_fn(1, freq.len(), |_, k| {
        let w = 2.0 * PI * freq[k];
        Complex64::new(1.0, 0.0) / Complex64::new(wn * wn - w * w, 2.0 * xi * wn * w)
    });
    let lscf = Lscf::new(frf, freq, LscfConfig::new(5.0, 300.0, 4)).unwrap();

    let poles = SolverResult::from_poles(vec![vec![pole, pole.conj()]]);
    let mut selection = ModalSelection::new();
    let picked = select_pole_near(&poles, &mut selection, 79.0, 0.0).unwrap();
    assert_eq!(picked, PoleRef::new(0, 0));

    let fit = lscf
        .lsfd(
            &poles,
            selection.as_slice(),
            &LsfdOptions::default(),
            ReconstructTarget::None,
        )
        .unwrap();
    assert!(fit.frf.is_none());
    assert_relative_eq!(
        fit.constants.residues[(0, 0)].im,
        -1.0 / (2.0 * pole.im),
        max_relative = 1e-4
    );
}
