//! Configuration options for the solver core.

use serde::{Deserialize, Serialize};

/// Option database for the optimization core.
///
/// Built once by the driver and treated as immutable afterwards. Field names
/// follow the external option schema, so a configuration file maps onto this
/// struct directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverOptions {
    // === Root linearization schemes ===
    /// RS1 stop threshold, as a percentage of the constraint rhs (or of the
    /// initial violation for near-zero rhs). Zero disables the scheme.
    pub root_lin_scheme1: f64,

    /// RS2 slope-change threshold in percent. Zero disables the scheme.
    pub root_lin_scheme2_per: f64,

    /// RS2 neighbourhood radius around the NLP point.
    pub root_lin_scheme2_nbh_size: f64,

    /// Maximum number of RS3 (supporting-hyperplane) rounds.
    pub root_lin_scheme3: u32,

    /// Enable the general positive-spanning scheme from the center (GS1).
    pub root_gen_lin_scheme1: bool,

    /// Enable the general positive-spanning scheme from the NLP point (GS2).
    pub root_gen_lin_scheme2: bool,

    // === Tolerances ===
    /// Integrality tolerance.
    pub int_tol: f64,

    /// Absolute objective-gap tolerance.
    pub sol_abs_tol: f64,

    /// Relative objective-gap tolerance.
    pub sol_rel_tol: f64,

    /// Absolute constraint feasibility tolerance.
    pub feas_abs_tol: f64,

    /// Relative constraint feasibility tolerance.
    pub feas_rel_tol: f64,

    /// Cut coefficients with magnitude below this are dropped to zero.
    pub con_coeff_tol: f64,

    // === Presolve ===
    /// Run the presolver pipeline.
    pub presolve: bool,

    /// Run nonlinear presolve reductions (requires the native computation
    /// graph).
    pub nl_presolve: bool,

    /// Evaluate derivatives through the native computation graph.
    pub use_native_cgraph: bool,

    /// Log the size of the presolved problem.
    pub display_presolved_size: bool,

    /// Log the presolved problem itself.
    pub display_presolved_problem: bool,

    // === Surrounding components ===
    /// Fix variables by reduced costs during branch-and-bound.
    pub rc_fix: bool,

    /// Run the linear feasibility pump heuristic before the root.
    pub fpump: bool,

    /// Depth of the MINLP diving heuristic; negative disables it.
    pub divheur: i32,

    /// Brancher selection for the tree search.
    pub brancher: String,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            root_lin_scheme1: 0.0,
            root_lin_scheme2_per: 0.0,
            root_lin_scheme2_nbh_size: 10.0,
            root_lin_scheme3: 0,
            root_gen_lin_scheme1: false,
            root_gen_lin_scheme2: false,

            int_tol: 1e-6,
            sol_abs_tol: 1e-6,
            sol_rel_tol: 1e-6,
            feas_abs_tol: 1e-6,
            feas_rel_tol: 1e-6,
            con_coeff_tol: 1e-6,

            presolve: true,
            nl_presolve: true,
            use_native_cgraph: true,
            display_presolved_size: false,
            display_presolved_problem: false,

            rc_fix: false,
            fpump: false,
            divheur: -1,
            brancher: "rel".to_string(),
        }
    }
}

impl SolverOptions {
    /// Enable RS1 with the given stop threshold (percent).
    pub fn with_scheme1(mut self, threshold: f64) -> Self {
        self.root_lin_scheme1 = threshold;
        self
    }

    /// Enable RS2 with the given slope threshold (percent) and radius.
    pub fn with_scheme2(mut self, per: f64, nbh_size: f64) -> Self {
        self.root_lin_scheme2_per = per;
        self.root_lin_scheme2_nbh_size = nbh_size;
        self
    }

    /// Enable RS3 with the given round limit.
    pub fn with_scheme3(mut self, rounds: u32) -> Self {
        self.root_lin_scheme3 = rounds;
        self
    }

    /// Enable the general spanning-set schemes.
    pub fn with_general_schemes(mut self, gs1: bool, gs2: bool) -> Self {
        self.root_gen_lin_scheme1 = gs1;
        self.root_gen_lin_scheme2 = gs2;
        self
    }
}
