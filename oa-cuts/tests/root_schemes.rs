//! Integration tests for the root linearization schemes against mock
//! engines.

use oa_core::{
    EngineSolution, EngineStatus, EvalError, Function, LinearExpr, MilpEngine, NonlinearOracle,
    Problem, QuadExpr, Relaxation, SolverOptions, VarType,
};
use oa_cuts::RootCutGenerator;
use std::sync::Arc;

struct Circle;

impl NonlinearOracle for Circle {
    fn eval(&self, x: &[f64]) -> Result<f64, EvalError> {
        Ok(x[0] * x[0] + x[1] * x[1])
    }

    fn gradient(&self, x: &[f64], grad: &mut [f64]) -> Result<(), EvalError> {
        grad[0] += 2.0 * x[0];
        grad[1] += 2.0 * x[1];
        Ok(())
    }

    fn vars(&self) -> &[usize] {
        &[0, 1]
    }
}

/// min -x  s.t.  x^2 + y^2 <= 1 over [-2, 2]^2.
fn disc_problem() -> Problem {
    let mut p = Problem::new();
    p.new_variable(-2.0, 2.0, VarType::Continuous, "x");
    p.new_variable(-2.0, 2.0, VarType::Continuous, "y");
    p.new_constraint(
        Function::from_nonlinear(Arc::new(Circle), None),
        f64::NEG_INFINITY,
        1.0,
        "ball",
    );
    p.new_objective(
        Function::from_linear(LinearExpr::from_terms([(0, -1.0)])),
        0.0,
        oa_core::ObjSense::Minimize,
    );
    p
}

/// MILP engine replaying a scripted solution per solve round.
struct ScriptedMilp {
    script: Vec<EngineSolution>,
    pos: usize,
}

impl MilpEngine for ScriptedMilp {
    fn load(&mut self, _rel: &Relaxation) {}

    fn solve(&mut self) -> EngineStatus {
        if self.pos + 1 < self.script.len() {
            self.pos += 1;
        }
        EngineStatus::ProvenOptimal
    }

    fn solution(&self) -> Option<&EngineSolution> {
        self.script.get(self.pos)
    }

    fn status_string(&self) -> String {
        "optimal".to_string()
    }

    fn clear(&mut self) {}
}

#[test]
fn test_scheme3_rounds_until_no_violation() {
    let p = disc_problem();
    let mut rel = Relaxation::from_problem(&p);
    let opts = SolverOptions::default().with_scheme3(5);
    let mut generator = RootCutGenerator::new(&p, vec![0], &opts);
    generator.set_center(Some(vec![0.0, 0.0]));

    // round 1 separates the iterate (2, 0); the follow-up iterate is
    // interior, so round 2 adds nothing and the loop stops early.
    let mut lpe = ScriptedMilp {
        script: vec![
            EngineSolution {
                objective: -2.0,
                primal: vec![2.0, 0.0],
            },
            EngineSolution {
                objective: -0.9,
                primal: vec![0.9, 0.0],
            },
        ],
        pos: 0,
    };
    let added = generator
        .root_lin_scheme3(&mut rel, &mut lpe, None)
        .unwrap();
    assert!(added);
    assert_eq!(generator.stats().rs3_cuts, 1);
    assert_eq!(rel.num_cons(), 1);

    // the cut supports the circle at (1, 0): 2x <= 2
    let cut = rel.con(0);
    let lf = cut.function.linear.as_ref().unwrap();
    assert!((lf.coeff(0) - 2.0).abs() < 1e-5);
    assert!((cut.ub - 2.0).abs() < 1e-5);
}

#[test]
fn test_scheme3_respects_round_limit() {
    let p = disc_problem();
    let mut rel = Relaxation::from_problem(&p);
    let opts = SolverOptions::default().with_scheme3(2);
    let mut generator = RootCutGenerator::new(&p, vec![0], &opts);
    generator.set_center(Some(vec![0.0, 0.0]));

    // every iterate violates the ball: the loop must stop after 2 rounds
    let mut lpe = ScriptedMilp {
        script: vec![
            EngineSolution {
                objective: -2.0,
                primal: vec![2.0, 0.0],
            },
            EngineSolution {
                objective: -2.0,
                primal: vec![0.0, 2.0],
            },
            EngineSolution {
                objective: -2.0,
                primal: vec![-2.0, 0.0],
            },
        ],
        pos: 0,
    };
    generator
        .root_lin_scheme3(&mut rel, &mut lpe, None)
        .unwrap();
    assert_eq!(generator.stats().rs3_cuts, 2);
}

#[test]
fn test_combined_univariate_and_general_schemes() {
    // x^2 - y <= 0 qualifies for RS1/RS2; the ball does not, so it is only
    // covered by GS1.
    let mut p = Problem::new();
    p.new_variable(-2.0, 2.0, VarType::Continuous, "x");
    p.new_variable(-2.0, 2.0, VarType::Continuous, "y");
    p.new_constraint(
        Function::from_quadratic(
            QuadExpr::from_terms([(0, 0, 1.0)]),
            Some(LinearExpr::from_terms([(1, -1.0)])),
        ),
        f64::NEG_INFINITY,
        0.0,
        "parab",
    );
    p.new_constraint(
        Function::from_nonlinear(Arc::new(Circle), None),
        f64::NEG_INFINITY,
        1.0,
        "ball",
    );

    let mut rel = Relaxation::from_problem(&p);
    let opts = SolverOptions::default()
        .with_scheme1(30.0)
        .with_scheme2(10.0, 2.0)
        .with_general_schemes(true, false);
    let mut generator = RootCutGenerator::new(&p, vec![0, 1], &opts);
    generator.set_center(Some(vec![0.0, 0.1]));
    generator.root_linearizations(&mut rel, &[0.5, 0.25]);

    let stats = generator.stats();
    assert!(stats.rs1_cuts > 0);
    assert!(stats.rgs1_cuts > 0);
    assert_eq!(
        rel.num_cons() as u32,
        stats.rs1_cuts + stats.rs2_cuts + stats.rgs1_cuts
    );

    // every cut keeps the feasible set: points satisfying both constraints
    // satisfy every cut
    for &(x, y) in &[(0.0, 0.5), (0.5, 0.5), (-0.5, 0.3), (0.0, 1.0), (0.6, 0.7)] {
        assert!(x * x <= y + 1e-9, "test point must be feasible");
        assert!(x * x + y * y <= 1.0 + 1e-9, "test point must be feasible");
        let pt = [x, y];
        for c in rel.cons() {
            let act = c.function.linear.as_ref().unwrap().eval(&pt);
            assert!(
                act <= c.ub + 1e-5,
                "cut {} cuts off feasible point ({x}, {y})",
                c.name
            );
        }
    }
}
