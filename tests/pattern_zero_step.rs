use dfoptim::mesh::Infinite;
use dfoptim::pattern::PatternBuilder;
use dfoptim::{Error, Point, SolverBuilder};

/// A mesh already at the resolution floor contracts to nothing in a few
/// dozen halvings, and the driver surfaces the zero-step signal.
#[test]
fn contracting_to_zero_stops_the_driver() {
    let start = Point::unevaluated(&[3.2, -1.7]);
    let pattern = PatternBuilder::new(start.clone()).build();

    let flat = |_x: &[f64]| 0.0;
    let mut solver = SolverBuilder::new(
        Box::new(pattern),
        Box::new(flat),
        Box::new(Infinite::new(start.pos(), 1e-8)),
    )
    .max_iter(100)
    .build();

    let err = solver.run().unwrap_err();
    assert!(matches!(err, Error::ZeroStep));
    assert!(matches!(solver.err(), Some(Error::ZeroStep)));

    // one improving poll (inf -> 0), then pure contraction; 27 halvings of
    // 1e-8 drop below the resolution of coordinates this size
    assert!(
        solver.niter() <= 30,
        "took {} iterations to contract",
        solver.niter()
    );
    assert_eq!(solver.best().val, 0.0);
    for i in 0..2 {
        assert!(
            (solver.best().at(i) - start.at(i)).abs() <= 1e-7,
            "incumbent wandered: {:?}",
            solver.best().pos()
        );
    }
}
