//! Integration tests for the single-tree OA handler, driven by mock
//! engines.

use oa_core::{
    EngineSolution, EngineStatus, Function, LinearExpr, MilpEngine, NlpEngine, Problem,
    QuadExpr, Relaxation, SolverOptions, VarType,
};
use oa_cuts::StoaHandler;

/// NLP "engine" for `min y  s.t.  z^2 - y <= 0`, z integer.
///
/// When z is fixed (equal bounds) the subproblem optimum is y = z^2; at the
/// root it is (0, 0).
struct ParabolaNlp {
    sol: Option<EngineSolution>,
    status: EngineStatus,
}

impl ParabolaNlp {
    fn new() -> Self {
        Self {
            sol: None,
            status: EngineStatus::EngineUnknownStatus,
        }
    }
}

impl NlpEngine for ParabolaNlp {
    fn load(&mut self, problem: &Problem) {
        let z = problem.var(0);
        let zval = if z.is_fixed() { z.lb } else { 0.0 };
        self.sol = Some(EngineSolution {
            objective: zval * zval,
            primal: vec![zval, zval * zval],
        });
        self.status = EngineStatus::ProvenOptimal;
    }

    fn solve(&mut self) -> EngineStatus {
        self.status
    }

    fn solution(&self) -> Option<&EngineSolution> {
        self.sol.as_ref()
    }

    fn status_string(&self) -> String {
        self.status.as_str().to_string()
    }

    fn empty_copy(&self) -> Box<dyn NlpEngine> {
        Box::new(ParabolaNlp::new())
    }

    fn clear(&mut self) {
        self.sol = None;
    }
}

/// MILP engine returning a scripted sequence of solutions.
struct ScriptedMilp {
    script: Vec<(EngineStatus, Option<EngineSolution>)>,
    pos: usize,
    loads: usize,
}

impl ScriptedMilp {
    fn new(script: Vec<(EngineStatus, Option<EngineSolution>)>) -> Self {
        Self {
            script,
            pos: 0,
            loads: 0,
        }
    }
}

impl MilpEngine for ScriptedMilp {
    fn load(&mut self, _rel: &Relaxation) {
        self.loads += 1;
    }

    fn solve(&mut self) -> EngineStatus {
        if self.pos + 1 < self.script.len() {
            self.pos += 1;
        }
        self.script[self.pos].0
    }

    fn solution(&self) -> Option<&EngineSolution> {
        self.script[self.pos].1.as_ref()
    }

    fn status_string(&self) -> String {
        self.script[self.pos].0.as_str().to_string()
    }

    fn clear(&mut self) {}
}

/// min y  s.t.  z^2 - y <= 0, z integer in [0, 5], y in [-10, 10].
fn parabola_minlp() -> Problem {
    let mut p = Problem::new();
    p.new_variable(0.0, 5.0, VarType::Integer, "z");
    p.new_variable(-10.0, 10.0, VarType::Continuous, "y");
    p.new_constraint(
        Function::from_quadratic(
            QuadExpr::from_terms([(0, 0, 1.0)]),
            Some(LinearExpr::from_terms([(1, -1.0)])),
        ),
        f64::NEG_INFINITY,
        0.0,
        "parab",
    );
    p.new_objective(
        Function::from_linear(LinearExpr::from_terms([(1, 1.0)])),
        0.0,
        oa_core::ObjSense::Minimize,
    );
    p
}

fn parabola_handler() -> StoaHandler {
    let minlp = parabola_minlp();
    let rel = Relaxation::from_problem(&minlp);
    let milp = ScriptedMilp::new(vec![(
        EngineStatus::ProvenOptimal,
        Some(EngineSolution {
            objective: 0.0,
            primal: vec![2.3, 5.0],
        }),
    )]);
    StoaHandler::new(
        minlp,
        rel,
        Box::new(ParabolaNlp::new()),
        Box::new(milp),
        &SolverOptions::default(),
    )
}

#[test]
fn test_relax_init_inc_seeds_root_linearization() {
    let mut handler = parabola_handler();
    let is_inf = handler.relax_init_inc().unwrap();
    assert!(!is_inf);

    // linear objective: no objective variable
    assert!(handler.obj_var().is_none());

    // one initial cut at the root primal (0, 0): tangent -y <= 0
    assert_eq!(handler.stats().cuts, 1);
    let rel = handler.rel();
    let cut = rel.con(rel.num_cons() - 1);
    let lf = cut.function.linear.as_ref().unwrap();
    assert_eq!(lf.coeff(1), -1.0);
    assert_eq!(cut.ub, 0.0);
}

#[test]
fn test_fixed_nlp_rounds_fixes_and_restores_bounds() {
    let mut handler = parabola_handler();
    handler.relax_init_inc().unwrap();

    let before = {
        let z = handler.minlp().var(0);
        (z.lb.to_bits(), z.ub.to_bits())
    };

    // LP value 2.3 rounds to z = 2; subproblem optimum y = 4
    let feasible = handler.fixed_nlp(&[2.3, 5.0]);
    assert!(feasible);
    assert_eq!(handler.num_calls(), 1);
    assert_eq!(handler.stats().nlp_feasible, 2); // root solve + fixed solve

    let (ub, idx, val) = handler.new_ub();
    assert_eq!(ub, 4.0);
    assert_eq!(idx, vec![0, 1]);
    assert_eq!(val, vec![2.0, 4.0]);
    assert_eq!(handler.sol_pool().best_objective(), 4.0);

    // bounds restored bit for bit
    let after = {
        let z = handler.minlp().var(0);
        (z.lb.to_bits(), z.ub.to_bits())
    };
    assert_eq!(before, after);
}

#[test]
fn test_oa_cut_to_cons_emits_violated_linearization() {
    let mut handler = parabola_handler();
    handler.relax_init_inc().unwrap();
    handler.fixed_nlp(&[2.3, 5.0]);

    let cons_before = handler.rel().num_cons();
    // constraint violated at the LP point (2.3, 5.0): 5.29 - 5 > 0;
    // tangent at the NLP primal (2, 4): 4z - y <= 4, violated by 0.2
    let cut = handler.oa_cut_to_cons(&[2.3, 5.0], 0).unwrap();
    assert_eq!(cut.rhs, 4.0);
    assert_eq!(cut.var_idx, vec![0, 1]);
    assert_eq!(cut.var_coeff, vec![4.0, -1.0]);

    // also appended to the relaxation
    assert_eq!(handler.rel().num_cons(), cons_before + 1);
}

#[test]
fn test_oa_cut_suppressed_when_constraint_feasible_at_lp() {
    let mut handler = parabola_handler();
    handler.relax_init_inc().unwrap();
    handler.fixed_nlp(&[2.0, 4.0]);

    // (1.0, 2.0) satisfies z^2 - y <= 0: no cut
    assert!(handler.oa_cut_to_cons(&[1.0, 2.0], 0).is_none());
}

#[test]
fn test_is_feas_probe() {
    let mut handler = parabola_handler();
    handler.relax_init_inc().unwrap();
    assert!(handler.is_feas(&[2.0, 4.5]));
    assert!(!handler.is_feas(&[2.0, 3.0]));
}

#[test]
fn test_solve_milp_returns_scripted_solution() {
    let mut handler = parabola_handler();
    handler.relax_init_inc().unwrap();
    let (obj, primal) = handler.solve_milp().unwrap();
    assert_eq!(obj, 0.0);
    assert_eq!(primal, vec![2.3, 5.0]);
    assert_eq!(handler.stats().milp_solved, 1);
}

#[test]
fn test_solve_milp_fatal_on_engine_error() {
    let minlp = parabola_minlp();
    let rel = Relaxation::from_problem(&minlp);
    let handler_milp = ScriptedMilp::new(vec![(EngineStatus::EngineError, None)]);
    let mut handler = StoaHandler::new(
        minlp,
        rel,
        Box::new(ParabolaNlp::new()),
        Box::new(handler_milp),
        &SolverOptions::default(),
    );
    handler.relax_init_inc().unwrap();
    assert!(handler.solve_milp().is_err());
}

/// NLP engine that fails with a scripted status after the root solve.
struct FlakyNlp {
    root: ParabolaNlp,
    after_root: EngineStatus,
    calls: usize,
    last_iterate: Option<EngineSolution>,
}

impl NlpEngine for FlakyNlp {
    fn load(&mut self, problem: &Problem) {
        self.root.load(problem);
    }

    fn solve(&mut self) -> EngineStatus {
        self.calls += 1;
        if self.calls == 1 {
            EngineStatus::ProvenOptimal
        } else {
            self.last_iterate = self.root.sol.clone();
            self.after_root
        }
    }

    fn solution(&self) -> Option<&EngineSolution> {
        if self.calls <= 1 {
            self.root.solution()
        } else {
            self.last_iterate.as_ref()
        }
    }

    fn status_string(&self) -> String {
        self.after_root.as_str().to_string()
    }

    fn empty_copy(&self) -> Box<dyn NlpEngine> {
        Box::new(ParabolaNlp::new())
    }

    fn clear(&mut self) {}
}

fn flaky_handler(after_root: EngineStatus) -> StoaHandler {
    let minlp = parabola_minlp();
    let rel = Relaxation::from_problem(&minlp);
    StoaHandler::new(
        minlp,
        rel,
        Box::new(FlakyNlp {
            root: ParabolaNlp::new(),
            after_root,
            calls: 0,
            last_iterate: None,
        }),
        Box::new(ScriptedMilp::new(vec![(EngineStatus::ProvenOptimal, None)])),
        &SolverOptions::default(),
    )
}

#[test]
fn test_infeasible_fixed_nlp_updates_counters_not_pool() {
    let mut handler = flaky_handler(EngineStatus::ProvenLocalInfeasible);
    handler.relax_init_inc().unwrap();

    assert!(!handler.fixed_nlp(&[2.3, 5.0]));
    assert_eq!(handler.stats().nlp_infeasible, 1);
    assert!(handler.sol_pool().is_empty());
    let (ub, _, _) = handler.new_ub();
    assert_eq!(ub, f64::INFINITY);
}

#[test]
fn test_iteration_limit_falls_back_to_lp_point() {
    let mut handler = flaky_handler(EngineStatus::EngineIterationLimit);
    handler.relax_init_inc().unwrap();

    assert!(!handler.fixed_nlp(&[2.3, 5.0]));
    assert_eq!(handler.stats().nlp_iter_limit, 1);

    // cut derived by linearizing at the LP point itself: tangent at
    // z = 2.3 is 4.6 z - y <= 5.29
    let cut = handler.oa_cut_to_cons(&[2.3, 5.0], 0).unwrap();
    assert!((cut.rhs - 5.29).abs() < 1e-9);
    assert_eq!(cut.var_idx, vec![0, 1]);
    assert!((cut.var_coeff[0] - 4.6).abs() < 1e-9);
    assert_eq!(cut.var_coeff[1], -1.0);
}

/// Engine for `min x^2  s.t.  z - x <= 0`, z integer: x* = max(0, fixed z).
struct ObjNlp {
    sol: Option<EngineSolution>,
}

impl NlpEngine for ObjNlp {
    fn load(&mut self, problem: &Problem) {
        let z = problem.var(0);
        let zval = if z.is_fixed() { z.lb } else { 0.0 };
        let x = zval.max(0.0);
        self.sol = Some(EngineSolution {
            objective: x * x,
            primal: vec![zval, x],
        });
    }

    fn solve(&mut self) -> EngineStatus {
        EngineStatus::ProvenOptimal
    }

    fn solution(&self) -> Option<&EngineSolution> {
        self.sol.as_ref()
    }

    fn status_string(&self) -> String {
        "optimal".to_string()
    }

    fn empty_copy(&self) -> Box<dyn NlpEngine> {
        Box::new(ObjNlp { sol: None })
    }

    fn clear(&mut self) {
        self.sol = None;
    }
}

/// min x^2  s.t.  z - x <= 0, z integer in [0, 3], x in [-5, 5].
fn quad_obj_minlp() -> Problem {
    let mut p = Problem::new();
    p.new_variable(0.0, 3.0, VarType::Integer, "z");
    p.new_variable(-5.0, 5.0, VarType::Continuous, "x");
    p.new_constraint(
        Function::from_linear(LinearExpr::from_terms([(0, 1.0), (1, -1.0)])),
        f64::NEG_INFINITY,
        0.0,
        "link",
    );
    p.new_objective(
        Function::from_quadratic(QuadExpr::from_terms([(1, 1, 1.0)]), None),
        0.0,
        oa_core::ObjSense::Minimize,
    );
    p
}

#[test]
fn test_nonlinear_objective_is_reformulated_and_cut() {
    let minlp = quad_obj_minlp();
    let rel = Relaxation::from_problem(&minlp);
    let mut handler = StoaHandler::new(
        minlp,
        rel,
        Box::new(ObjNlp { sol: None }),
        Box::new(ScriptedMilp::new(vec![(EngineStatus::ProvenOptimal, None)])),
        &SolverOptions::default(),
    );
    let is_inf = handler.relax_init_inc().unwrap();
    assert!(!is_inf);

    // objective variable added past the source variables
    let eta = handler.obj_var().unwrap();
    assert_eq!(eta, 2);
    let o = handler.rel().objective().unwrap();
    assert_eq!(o.linear.coeff(eta), 1.0);

    // fixed z = 1: subproblem optimum x = 1, objective 1
    assert!(handler.fixed_nlp(&[1.2, 1.0, 0.5]));

    // objective violated at the LP point (x = 1, eta = 0.5): tangent cut
    // 2x - eta <= 1
    let cut = handler.oa_cut_to_obj(&[1.2, 1.0, 0.5], 0.5).unwrap();
    assert_eq!(cut.rhs, 1.0);
    assert_eq!(cut.var_idx, vec![1, eta]);
    assert_eq!(cut.var_coeff, vec![2.0, -1.0]);
}
