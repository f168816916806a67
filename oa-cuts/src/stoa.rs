//! Single-tree outer-approximation handler.
//!
//! Works against an existing MILP relaxation during branch-and-bound: at an
//! integer-feasible relaxation solution it fixes the integer variables,
//! solves the continuous NLP, and turns the result into OA cuts for the
//! MILP engine's callback API. The engine's callbacks re-enter the handler,
//! never themselves.

use oa_core::{
    violates_ub, CoreError, CoreResult, EngineStatus, FunctionType, LinearExpr, MilpEngine,
    NlpEngine, ObjSense, Problem, Relaxation, Solution, SolutionPool, SolverOptions,
    StatusAction, VarBoundMod, VarType,
};

use crate::linearize::linear_at;

/// Counters for the handler.
#[derive(Debug, Default, Clone)]
pub struct StoaStats {
    /// NLPs solved.
    pub nlp_solved: u32,

    /// Feasible NLPs.
    pub nlp_feasible: u32,

    /// Infeasible NLPs.
    pub nlp_infeasible: u32,

    /// NLPs that hit the engine iteration limit.
    pub nlp_iter_limit: u32,

    /// MILPs solved.
    pub milp_solved: u32,

    /// MILPs that hit the engine iteration limit.
    pub milp_iter_limit: u32,

    /// OA cuts added.
    pub cuts: u32,
}

/// A cut in the sparse row form of the MILP engine's callback API.
#[derive(Debug, Clone)]
pub struct OaCut {
    /// Right-hand side of `sum coeff * x <= rhs`.
    pub rhs: f64,

    /// Variable indices.
    pub var_idx: Vec<usize>,

    /// Matching coefficients.
    pub var_coeff: Vec<f64>,
}

impl OaCut {
    fn from_linear(lf: &LinearExpr, rhs: f64) -> Self {
        let (var_idx, var_coeff) = lf.iter().unzip();
        Self {
            rhs,
            var_idx,
            var_coeff,
        }
    }
}

/// Single-tree OA handler.
pub struct StoaHandler {
    minlp: Problem,
    rel: Relaxation,
    nlpe: Box<dyn NlpEngine>,
    milpe: Box<dyn MilpEngine>,

    nl_cons: Vec<usize>,
    obj_var: Option<usize>,
    o_nl: bool,
    nlp_status: EngineStatus,
    nlp_mods: Vec<VarBoundMod>,
    sol_pool: SolutionPool,
    rel_obj: f64,
    new_ub: f64,
    num_calls: u32,

    feas_abs_tol: f64,
    feas_rel_tol: f64,
    obj_abs_tol: f64,
    obj_rel_tol: f64,
    coeff_tol: f64,

    stats: StoaStats,
}

impl StoaHandler {
    /// Create a handler over the source problem, its relaxation and the two
    /// engines. The handler has exclusive access to all four for its
    /// lifetime.
    pub fn new(
        minlp: Problem,
        rel: Relaxation,
        nlpe: Box<dyn NlpEngine>,
        milpe: Box<dyn MilpEngine>,
        options: &SolverOptions,
    ) -> Self {
        Self {
            minlp,
            rel,
            nlpe,
            milpe,
            nl_cons: Vec::new(),
            obj_var: None,
            o_nl: false,
            nlp_status: EngineStatus::EngineUnknownStatus,
            nlp_mods: Vec::new(),
            sol_pool: SolutionPool::new(),
            rel_obj: 0.0,
            new_ub: f64::INFINITY,
            num_calls: 0,
            feas_abs_tol: options.feas_abs_tol,
            feas_rel_tol: options.feas_rel_tol,
            obj_abs_tol: options.sol_abs_tol,
            obj_rel_tol: options.sol_rel_tol,
            coeff_tol: options.con_coeff_tol,
            stats: StoaStats::default(),
        }
    }

    /// Initial relaxation setup: collect the nonlinear constraints,
    /// reformulate a nonlinear objective through an objective variable,
    /// solve the unrestricted NLP once and seed the relaxation with
    /// linearizations at its primal.
    ///
    /// Returns `true` when the root NLP is infeasible, which is terminal
    /// for the search.
    pub fn relax_init_inc(&mut self) -> CoreResult<bool> {
        self.nl_cons = self
            .minlp
            .cons()
            .filter(|c| {
                let ft = c.ftype();
                ft != FunctionType::Constant && ft != FunctionType::Linear
            })
            .map(|c| c.index)
            .collect();
        self.linearize_obj()?;
        self.init_linear()
    }

    /// Objective variable index when the objective was reformulated.
    pub fn obj_var(&self) -> Option<usize> {
        self.obj_var
    }

    /// The relaxation the handler extends.
    pub fn rel(&self) -> &Relaxation {
        &self.rel
    }

    /// The source problem.
    pub fn minlp(&self) -> &Problem {
        &self.minlp
    }

    /// The solution pool fed by feasible fixed-integer NLPs.
    pub fn sol_pool(&self) -> &SolutionPool {
        &self.sol_pool
    }

    /// Handler counters.
    pub fn stats(&self) -> &StoaStats {
        &self.stats
    }

    /// Number of `fixed_nlp` invocations.
    pub fn num_calls(&self) -> u32 {
        self.num_calls
    }

    fn linearize_obj(&mut self) -> CoreResult<()> {
        let Some(o) = self.minlp.objective() else {
            return Err(CoreError::InvalidProblem(
                "an objective is required".to_string(),
            ));
        };
        let ft = o.function.ftype();
        if ft == FunctionType::Linear || ft == FunctionType::Constant {
            return Ok(());
        }
        if o.sense != ObjSense::Minimize {
            return Err(CoreError::InvalidProblem(
                "objective must be minimization; run standardize first".to_string(),
            ));
        }
        self.o_nl = true;
        let eta = self
            .rel
            .new_variable(f64::NEG_INFINITY, f64::INFINITY, VarType::Continuous, "eta");
        self.rel.remove_objective();
        self.rel
            .new_objective(LinearExpr::from_terms([(eta, 1.0)]), 0.0);
        self.obj_var = Some(eta);
        Ok(())
    }

    fn init_linear(&mut self) -> CoreResult<bool> {
        self.solve_nlp();
        match self.nlp_status.action() {
            StatusAction::UsePrimal => {
                self.stats.nlp_feasible += 1;
            }
            StatusAction::UsePrimalCaveat => {
                self.stats.nlp_iter_limit += 1;
            }
            StatusAction::Infeasible => {
                self.stats.nlp_infeasible += 1;
                return Ok(true);
            }
            StatusAction::Fatal => {
                return Err(CoreError::EngineFailure(format!(
                    "NLP engine status at root = {}",
                    self.nlpe.status_string()
                )));
            }
        }
        let x = self
            .nlpe
            .solution()
            .ok_or_else(|| {
                CoreError::EngineFailure("NLP engine returned no root solution".to_string())
            })?
            .primal
            .clone();
        self.add_init_linear_x(&x);
        Ok(false)
    }

    /// Seed the relaxation with one linearization per nonlinear constraint
    /// (and the objective) at the root NLP primal.
    fn add_init_linear_x(&mut self, x: &[f64]) {
        for ci in self.nl_cons.clone() {
            let con = self.minlp.con(ci);
            let Ok(act) = con.activity(x) else {
                log::error!("constraint {} is not defined at this point", con.name);
                continue;
            };
            let Ok((lf, c)) =
                linear_at(&con.function, act, x, self.rel.num_vars(), self.coeff_tol)
            else {
                continue;
            };
            self.stats.cuts += 1;
            let name = format!("_STOAcut_{}_AtRoot", self.stats.cuts);
            self.rel
                .new_linear_constraint(lf, f64::NEG_INFINITY, con.ub - c, &name);
        }

        if self.o_nl {
            let o = self.minlp.objective().expect("objective checked earlier");
            let Ok(act) = o.function.eval(x) else {
                log::error!("objective not defined at this point");
                return;
            };
            let Ok((mut lf, c)) =
                linear_at(&o.function, act, x, self.rel.num_vars(), self.coeff_tol)
            else {
                return;
            };
            self.stats.cuts += 1;
            let eta = self.obj_var.expect("set in linearize_obj");
            lf.add_term(eta, -1.0);
            let name = format!("_STOAObjcut_{}_AtRoot", self.stats.cuts);
            self.rel
                .new_linear_constraint(lf, f64::NEG_INFINITY, -c, &name);
        }
    }

    /// Feasibility probe for a relaxation point against the nonlinear
    /// constraints and, after an objective reformulation, the objective
    /// gap.
    pub fn is_feas(&mut self, x: &[f64]) -> bool {
        for &ci in &self.nl_cons {
            let con = self.minlp.con(ci);
            let Ok(act) = con.activity(x) else {
                log::error!("constraint {} not defined at this point", con.name);
                return false;
            };
            if act > con.ub + self.feas_abs_tol
                || (con.ub != 0.0 && act > con.ub + con.ub.abs() * self.feas_rel_tol)
            {
                return false;
            }
        }
        if self.o_nl {
            let eta = self.obj_var.expect("set in linearize_obj");
            self.rel_obj = x[eta];
            let Ok(act) = self.minlp.obj_value(x) else {
                log::error!("objective not defined at this point");
                return false;
            };
            if act > self.rel_obj + self.obj_abs_tol
                || (self.rel_obj != 0.0
                    && act > self.rel_obj + self.rel_obj.abs() * self.obj_rel_tol)
            {
                return false;
            }
        }
        true
    }

    /// Fix every integer variable to its rounded relaxation value, solve
    /// the continuous NLP, and restore the bounds. On a feasible optimum
    /// the primal enters the solution pool and becomes the candidate upper
    /// bound.
    pub fn fixed_nlp(&mut self, lpx: &[f64]) -> bool {
        self.num_calls += 1;
        self.new_ub = f64::INFINITY;

        self.fix_ints(lpx);
        self.solve_nlp();
        self.unfix_ints();

        match self.nlp_status {
            EngineStatus::ProvenOptimal | EngineStatus::ProvenLocalOptimal => {
                self.stats.nlp_feasible += 1;
                if let Some(sol) = self.nlpe.solution() {
                    self.new_ub = sol.objective;
                    self.sol_pool
                        .add(Solution::new(sol.objective, sol.primal.clone()));
                    return true;
                }
                false
            }
            EngineStatus::ProvenInfeasible
            | EngineStatus::ProvenLocalInfeasible
            | EngineStatus::ProvenObjectiveCutOff => {
                self.stats.nlp_infeasible += 1;
                false
            }
            EngineStatus::EngineIterationLimit => {
                self.stats.nlp_iter_limit += 1;
                false
            }
            _ => {
                log::error!("NLP engine status = {}", self.nlpe.status_string());
                log::error!("no cut generated, may cycle");
                false
            }
        }
    }

    /// OA cut for one nonlinear constraint at the relaxation point `lpx`,
    /// derived from the last `fixed_nlp` outcome. The cut is appended to
    /// the relaxation and returned in callback row form; `None` when no
    /// violated cut exists.
    pub fn oa_cut_to_cons(&mut self, lpx: &[f64], con_idx: usize) -> Option<OaCut> {
        match self.nlp_status {
            EngineStatus::ProvenOptimal
            | EngineStatus::ProvenLocalOptimal
            | EngineStatus::ProvenInfeasible
            | EngineStatus::ProvenLocalInfeasible
            | EngineStatus::ProvenObjectiveCutOff => {
                let nlpx = self.nlpe.solution()?.primal.clone();
                self.cut_to_cons(&nlpx, lpx, con_idx)
            }
            EngineStatus::EngineIterationLimit => self.cons_cut_at_lp_sol(lpx, con_idx),
            _ => {
                log::error!("unknown NLP engine status");
                None
            }
        }
    }

    /// OA cut for the reformulated objective; `ub` is the relaxation
    /// objective value at `lpx`.
    pub fn oa_cut_to_obj(&mut self, lpx: &[f64], ub: f64) -> Option<OaCut> {
        self.rel_obj = ub;
        match self.nlp_status {
            EngineStatus::ProvenOptimal | EngineStatus::ProvenLocalOptimal => {
                let nlpx = self.nlpe.solution()?.primal.clone();
                self.cut_to_obj(&nlpx, lpx)
            }
            EngineStatus::EngineIterationLimit => self.obj_cut_at_lp_sol(lpx),
            _ => None,
        }
    }

    /// Solve the MILP relaxation. Optimal and iteration-limited solves
    /// return the primal and objective; anything else is fatal for the
    /// handler.
    pub fn solve_milp(&mut self) -> CoreResult<(f64, Vec<f64>)> {
        self.milpe.load(&self.rel);
        let status = self.milpe.solve();
        self.stats.milp_solved += 1;
        match status.action() {
            StatusAction::UsePrimal | StatusAction::UsePrimalCaveat => {
                if status.action() == StatusAction::UsePrimalCaveat {
                    self.stats.milp_iter_limit += 1;
                }
                let sol = self.milpe.solution().ok_or_else(|| {
                    CoreError::EngineFailure("MILP engine returned no solution".to_string())
                })?;
                Ok((sol.objective, sol.primal.clone()))
            }
            StatusAction::Infeasible | StatusAction::Fatal => Err(CoreError::EngineFailure(
                format!("MILP engine status = {}", self.milpe.status_string()),
            )),
        }
    }

    /// The last fixed-NLP optimum as a candidate incumbent in
    /// `(indices, values)` form, together with its objective value.
    pub fn new_ub(&self) -> (f64, Vec<usize>, Vec<f64>) {
        let mut idx = Vec::new();
        let mut val = Vec::new();
        if let Some(sol) = self.nlpe.solution() {
            for v in self.minlp.vars() {
                idx.push(v.index);
                val.push(sol.primal[v.index]);
            }
            if self.o_nl {
                idx.push(self.obj_var.expect("set in linearize_obj"));
                val.push(sol.objective);
            }
        }
        (self.new_ub, idx, val)
    }

    /// Log the handler counters.
    pub fn log_stats(&self) {
        log::info!(
            "stoa: nlps = {} (feasible {}, infeasible {}, iter-limit {}), milps = {} (iter-limit {}), cuts = {}",
            self.stats.nlp_solved,
            self.stats.nlp_feasible,
            self.stats.nlp_infeasible,
            self.stats.nlp_iter_limit,
            self.stats.milp_solved,
            self.stats.milp_iter_limit,
            self.stats.cuts,
        );
    }

    fn solve_nlp(&mut self) {
        self.nlpe.load(&self.minlp);
        self.nlp_status = self.nlpe.solve();
        self.stats.nlp_solved += 1;
    }

    fn fix_ints(&mut self, x: &[f64]) {
        for v in 0..self.minlp.num_vars() {
            if !self.minlp.var(v).vtype.is_integral() {
                continue;
            }
            let xval = (x[v] + 0.5).floor();
            let m = VarBoundMod::fix(&self.minlp, v, xval);
            m.apply(&mut self.minlp);
            self.nlp_mods.push(m);
        }
    }

    fn unfix_ints(&mut self) {
        while let Some(m) = self.nlp_mods.pop() {
            m.undo(&mut self.minlp);
        }
    }

    fn cut_to_cons(&mut self, nlpx: &[f64], lpx: &[f64], con_idx: usize) -> Option<OaCut> {
        let con = self.minlp.con(con_idx);
        let Ok(act) = con.activity(lpx) else {
            log::error!("constraint {} not defined at this point", con.name);
            return None;
        };
        if !violates_ub(act, con.ub, self.feas_abs_tol, self.feas_rel_tol) {
            log::debug!("constraint {} feasible at LP solution, no OA cut", con.name);
            return None;
        }
        self.add_cut(nlpx, lpx, con_idx)
    }

    /// Linearize at the NLP primal; emit only if the linearization itself
    /// is violated at the LP point.
    fn add_cut(&mut self, nlpx: &[f64], lpx: &[f64], con_idx: usize) -> Option<OaCut> {
        let con = self.minlp.con(con_idx);
        let Ok(act) = con.activity(nlpx) else {
            log::error!("constraint {} not defined at this point", con.name);
            return None;
        };
        let (lf, c) =
            linear_at(&con.function, act, nlpx, self.rel.num_vars(), self.coeff_tol).ok()?;
        let c_ub = con.ub;
        let lpvio = (lf.eval(lpx) - (c_ub - c)).max(0.0);
        if lpvio > self.feas_abs_tol
            || ((c_ub - c) != 0.0 && lpvio > (c_ub - c).abs() * self.feas_rel_tol)
        {
            self.stats.cuts += 1;
            let cut = OaCut::from_linear(&lf, c_ub - c);
            let name = format!("_STOAcut_{}", self.stats.cuts);
            self.rel
                .new_linear_constraint(lf, f64::NEG_INFINITY, c_ub - c, &name);
            Some(cut)
        } else {
            log::debug!(
                "linearization of {} not violated at LP solution, cut redundant",
                self.minlp.con(con_idx).name
            );
            None
        }
    }

    /// Iteration-limit fallback: linearize at the LP point itself.
    fn cons_cut_at_lp_sol(&mut self, lpx: &[f64], con_idx: usize) -> Option<OaCut> {
        let con = self.minlp.con(con_idx);
        let Ok(act) = con.activity(lpx) else {
            log::error!("constraint {} not defined at this point", con.name);
            return None;
        };
        if !violates_ub(act, con.ub, self.feas_abs_tol, self.feas_rel_tol) {
            return None;
        }
        let (lf, c) =
            linear_at(&con.function, act, lpx, self.rel.num_vars(), self.coeff_tol).ok()?;
        let c_ub = con.ub;
        let lpvio = (lf.eval(lpx) - (c_ub - c)).max(0.0);
        if lpvio > self.feas_abs_tol
            || ((c_ub - c) != 0.0 && lpvio > (c_ub - c).abs() * self.feas_rel_tol)
        {
            self.stats.cuts += 1;
            let cut = OaCut::from_linear(&lf, c_ub - c);
            let name = format!("_STOAcut_{}", self.stats.cuts);
            self.rel
                .new_linear_constraint(lf, f64::NEG_INFINITY, c_ub - c, &name);
            Some(cut)
        } else {
            None
        }
    }

    fn cut_to_obj(&mut self, nlpx: &[f64], lpx: &[f64]) -> Option<OaCut> {
        if !self.o_nl {
            return None;
        }
        let o = self.minlp.objective()?;
        let Ok(act) = o.function.eval(lpx) else {
            log::error!("objective not defined at this solution point");
            return None;
        };
        let vio = (act - self.rel_obj).max(0.0);
        if vio <= self.obj_abs_tol
            || (self.rel_obj != 0.0 && vio <= self.rel_obj.abs() * self.obj_rel_tol)
        {
            log::debug!("objective feasible at LP solution, no OA cut");
            return None;
        }
        let Ok(act) = o.function.eval(nlpx) else {
            log::error!("objective not defined at this solution point");
            return None;
        };
        let (mut lf, c) =
            linear_at(&o.function, act, nlpx, self.rel.num_vars(), self.coeff_tol).ok()?;
        let vio = (c + lf.eval(lpx) - self.rel_obj).max(0.0);
        if vio > self.obj_abs_tol
            && ((self.rel_obj - c) == 0.0 || vio > (self.rel_obj - c).abs() * self.obj_rel_tol)
        {
            self.stats.cuts += 1;
            let eta = self.obj_var.expect("set in linearize_obj");
            lf.add_term(eta, -1.0);
            let cut = OaCut::from_linear(&lf, -c);
            let name = format!("_STOAObjcut_{}", self.stats.cuts);
            self.rel
                .new_linear_constraint(lf, f64::NEG_INFINITY, -c, &name);
            Some(cut)
        } else {
            None
        }
    }

    /// Iteration-limit fallback for the objective cut.
    fn obj_cut_at_lp_sol(&mut self, lpx: &[f64]) -> Option<OaCut> {
        if !self.o_nl {
            return None;
        }
        let o = self.minlp.objective()?;
        let Ok(act) = o.function.eval(lpx) else {
            log::error!("objective not defined at this solution point");
            return None;
        };
        let vio = (act - self.rel_obj).max(0.0);
        if vio <= self.obj_abs_tol
            || (self.rel_obj != 0.0 && vio <= self.rel_obj.abs() * self.obj_rel_tol)
        {
            return None;
        }
        let (mut lf, c) =
            linear_at(&o.function, act, lpx, self.rel.num_vars(), self.coeff_tol).ok()?;
        self.stats.cuts += 1;
        let eta = self.obj_var.expect("set in linearize_obj");
        lf.add_term(eta, -1.0);
        let cut = OaCut::from_linear(&lf, -c);
        let name = format!("_STOAObjcut_{}", self.stats.cuts);
        self.rel
            .new_linear_constraint(lf, f64::NEG_INFINITY, -c, &name);
        Some(cut)
    }
}
