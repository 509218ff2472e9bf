//! # Dispatch LP construction
//!
//! Builds the linear program for one optimization window: charge/discharge
//! dispatch of a grid-connected battery with PV and load, under
//! time-varying prices and a progressive monthly power tariff.
//!
//! ## Formulation
//!
//! ```text
//! minimize    Σ_t [ p_imp(t)·P_imp(t) − p_exp(t)·P_exp(t) ]·Δt     energy
//!           + Σ_i c_i · z_i                                         power tariff (tight)
//!           + π · Σ_t V(t)                                          peak penalty (rolling)
//!           + (c_cell·E_nom/eol) · Σ_t DP(t)                        degradation
//!
//! subject to, for every step t:
//!   PV(t) + P_imp(t) + η_inv·P_dch(t)
//!       = Load(t) + P_exp(t) + P_ch(t)/η_inv + P_cur(t)             power balance
//!   E(t) = E(t−1) + η_ch·Δt·P_ch(t) − Δt·P_dch(t)/η_dch            SOC dynamics
//!   Δ+(t) − Δ−(t) = E(t) − E(t−1)                                   energy delta split
//!   E_nom·DOD(t) = Δ+(t) + Δ−(t)                                    normalized throughput
//!   DP_cyc(t) = ρ·DOD(t)                                            cyclic aging
//!   DP(t) ≥ DP_cyc(t),  DP(t) ≥ r_cal·Δt                            max of cyclic/calendar
//!
//! and the peak machinery:
//!   P_peak = Σ_i width_i·z_i,   z_i ≤ z_{i−1},   z_i ∈ [0, 1]
//!   tight:    P_imp(t) ≤ P_peak          (and P_peak ≥ committed month peak)
//!   penalty:  P_imp(t) − V(t) ≤ month_peak_kw,   V(t) ≥ 0
//! ```
//!
//! `E(−1)` is the initial SOC, a parameter of the window, never a
//! variable. Simultaneous charge and discharge is not forbidden (that
//! would need integer variables); with a non-negative degradation weight
//! the optimum drives their product to zero, and the extractor flags any
//! step where both exceed a small tolerance.
//!
//! The incremental bracket relaxation under-approximates the true step
//! tariff between vertex points; the solved peak is re-billed exactly
//! after the solve (see `bdt_core::TariffSpec::power_tariff_exact`).
//!
//! ## Assembly
//!
//! Constraints are accumulated as triplets into a sparse matrix
//! (`sprs::TriMat` → CSC), equalities first, then inequalities, so the
//! cone specification is two blocks. Row indices of every constraint class
//! are tracked for dual extraction.

use bdt_core::{
    BatterySpec, Diagnostics, ExogenousWindow, GridLimits, TariffSpec, TimeGrid,
};
use sprs::{CsMat, TriMat};

use crate::error::SolveError;

/// Peak handling of a window, selected by construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PeakMode {
    /// Window covers a full calendar month (or its remainder): hard peak
    /// tracking billed through bracket activations.
    MonthlyTight,
    /// Short rolling window: imports above the committed month peak are
    /// penalized at `penalty_per_kw` per step instead of hard-constrained.
    RollingPenalty { penalty_per_kw: f64 },
}

impl PeakMode {
    pub fn is_penalty(&self) -> bool {
        matches!(self, PeakMode::RollingPenalty { .. })
    }
}

/// Window parameters taken from the persistent battery state.
#[derive(Debug, Clone, Copy)]
pub struct WindowParams {
    /// Stored energy entering the window (kWh)
    pub initial_soc_kwh: f64,
    /// Committed hourly import peak of the current month (kW)
    pub month_peak_kw: f64,
    /// Peak handling mode
    pub mode: PeakMode,
}

// ============================================================================
// VARIABLE LAYOUT
// ============================================================================
//
// All variables are continuous. Columns are laid out in blocks of W (the
// window length), followed by the bracket activations, the window peak and
// (penalty mode only) the per-step violations. The layout is identical in
// both modes except for the trailing violation block, so extraction code
// is mode-agnostic.

/// Column layout of the window LP.
#[derive(Debug, Clone, Copy)]
pub struct VarLayout {
    /// Window length W
    pub steps: usize,
    /// Number of tariff brackets N
    pub n_brackets: usize,
    /// Whether the violation block exists
    pub penalty_mode: bool,
}

impl VarLayout {
    pub fn charge(&self, t: usize) -> usize {
        t
    }
    pub fn discharge(&self, t: usize) -> usize {
        self.steps + t
    }
    pub fn import(&self, t: usize) -> usize {
        2 * self.steps + t
    }
    pub fn export(&self, t: usize) -> usize {
        3 * self.steps + t
    }
    pub fn energy(&self, t: usize) -> usize {
        4 * self.steps + t
    }
    pub fn curtail(&self, t: usize) -> usize {
        5 * self.steps + t
    }
    pub fn delta_pos(&self, t: usize) -> usize {
        6 * self.steps + t
    }
    pub fn delta_neg(&self, t: usize) -> usize {
        7 * self.steps + t
    }
    pub fn dod(&self, t: usize) -> usize {
        8 * self.steps + t
    }
    pub fn dp_cyclic(&self, t: usize) -> usize {
        9 * self.steps + t
    }
    pub fn dp(&self, t: usize) -> usize {
        10 * self.steps + t
    }
    pub fn bracket(&self, i: usize) -> usize {
        11 * self.steps + i
    }
    pub fn peak(&self) -> usize {
        11 * self.steps + self.n_brackets
    }
    pub fn violation(&self, t: usize) -> usize {
        debug_assert!(self.penalty_mode);
        11 * self.steps + self.n_brackets + 1 + t
    }
    pub fn n_vars(&self) -> usize {
        11 * self.steps + self.n_brackets + 1 + if self.penalty_mode { self.steps } else { 0 }
    }
}

// ============================================================================
// ROW TRACKING
// ============================================================================

/// Row indices per constraint class, for dual extraction after the solve.
#[derive(Debug, Clone, Default)]
pub struct RowMap {
    pub balance: Vec<usize>,
    pub soc_dynamics: Vec<usize>,
    pub delta_split: Vec<usize>,
    pub dod_def: Vec<usize>,
    pub cyclic_def: Vec<usize>,
    pub peak_def: Option<usize>,
    pub bracket_order: Vec<usize>,
    /// Tight mode: `P_imp(t) ≤ P_peak`
    pub peak_track: Vec<usize>,
    /// Penalty mode: `P_imp(t) − V(t) ≤ month_peak_kw`
    pub violation_link: Vec<usize>,
    pub dp_ge_cyclic: Vec<usize>,
    pub dp_ge_calendar: Vec<usize>,
    /// Upper-bound rows on grid import, present when the limit is finite
    pub import_cap: Vec<usize>,
    /// Upper-bound rows on grid export, present when the limit is finite
    pub export_cap: Vec<usize>,
    pub peak_baseline: Option<usize>,
}

/// Assembled window LP, ready for the solver backend.
#[derive(Debug, Clone)]
pub struct DispatchProblem {
    pub layout: VarLayout,
    pub rows: RowMap,
    /// Constraint matrix in CSC storage (equalities stacked above
    /// inequalities)
    pub a: CsMat<f64>,
    pub rhs: Vec<f64>,
    /// Number of equality rows (leading)
    pub n_eq: usize,
    /// Number of inequality rows (trailing)
    pub n_ineq: usize,
    /// Linear objective
    pub objective: Vec<f64>,
    /// Time grid of the window
    pub grid: TimeGrid,
    /// All-in per-step import price (spot + time-of-use energy charge)
    pub effective_price_import: Vec<f64>,
    pub price_export: Vec<f64>,
    pub incremental_costs: Vec<f64>,
    pub degradation_weight: f64,
    pub calendar_aging_step: f64,
    pub cyclic_aging_coeff: f64,
    pub capacity_kwh: f64,
    pub penalty_per_kw: f64,
    pub params: WindowParams,
    pub diagnostics: Diagnostics,
}

impl DispatchProblem {
    /// Nonzero density of the constraint matrix, for solve logging.
    pub fn density(&self) -> f64 {
        let cells = self.a.rows() * self.a.cols();
        if cells == 0 {
            0.0
        } else {
            self.a.nnz() as f64 / cells as f64
        }
    }
}

// Triplet accumulator with per-class row tracking. Rows are appended
// equalities-first; inequalities are staged separately and merged at the
// end so the final row order is [eq | ineq].
struct Assembler {
    eq_rows: Vec<(usize, f64)>, // (col, coeff) flat storage, see eq_ptr
    eq_ptr: Vec<usize>,
    eq_rhs: Vec<f64>,
    ineq_rows: Vec<(usize, f64)>,
    ineq_ptr: Vec<usize>,
    ineq_rhs: Vec<f64>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            eq_rows: Vec::new(),
            eq_ptr: vec![0],
            eq_rhs: Vec::new(),
            ineq_rows: Vec::new(),
            ineq_ptr: vec![0],
            ineq_rhs: Vec::new(),
        }
    }

    /// Add `Σ coeff·x = b`; returns the provisional equality row index.
    fn push_eq(&mut self, coeffs: &[(usize, f64)], b: f64) -> usize {
        self.eq_rows.extend_from_slice(coeffs);
        self.eq_ptr.push(self.eq_rows.len());
        self.eq_rhs.push(b);
        self.eq_rhs.len() - 1
    }

    /// Add `Σ coeff·x ≤ b`; returns the final row index (offset by the
    /// equality count once assembly is finished).
    fn push_leq(&mut self, coeffs: &[(usize, f64)], b: f64) -> usize {
        self.ineq_rows.extend_from_slice(coeffs);
        self.ineq_ptr.push(self.ineq_rows.len());
        self.ineq_rhs.push(b);
        self.ineq_rhs.len() - 1
    }

    /// Merge into a CSC matrix with equalities stacked above inequalities.
    fn finish(self, n_vars: usize) -> (CsMat<f64>, Vec<f64>, usize, usize) {
        let n_eq = self.eq_rhs.len();
        let n_ineq = self.ineq_rhs.len();
        let nnz = self.eq_rows.len() + self.ineq_rows.len();

        let mut row_inds = Vec::with_capacity(nnz);
        let mut col_inds = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);

        for r in 0..n_eq {
            for &(col, val) in &self.eq_rows[self.eq_ptr[r]..self.eq_ptr[r + 1]] {
                row_inds.push(r);
                col_inds.push(col);
                values.push(val);
            }
        }
        for r in 0..n_ineq {
            for &(col, val) in &self.ineq_rows[self.ineq_ptr[r]..self.ineq_ptr[r + 1]] {
                row_inds.push(n_eq + r);
                col_inds.push(col);
                values.push(val);
            }
        }

        let tri = TriMat::from_triplets((n_eq + n_ineq, n_vars), row_inds, col_inds, values);
        let a = tri.to_csc();

        let mut rhs = self.eq_rhs;
        rhs.extend_from_slice(&self.ineq_rhs);
        (a, rhs, n_eq, n_ineq)
    }
}

/// Build the window LP.
///
/// Validates specs and the initial SOC, computes effective prices, and
/// assembles constraint matrix, objective and row map. Infeasibility
/// cannot arise from the model itself: curtailment is an unbounded slack
/// and the import limit is checked against the load it must cover.
pub fn build_window(
    window: &ExogenousWindow<'_>,
    battery: &BatterySpec,
    tariff: &TariffSpec,
    limits: &GridLimits,
    params: WindowParams,
) -> Result<DispatchProblem, SolveError> {
    battery.validate()?;
    tariff.validate()?;
    limits.validate()?;

    let w = window.len();
    if w == 0 {
        return Err(SolveError::DataValidation("empty optimization window".into()));
    }
    let soc0 = params.initial_soc_kwh;
    if soc0 < battery.min_energy_kwh() - 1e-6 || soc0 > battery.max_energy_kwh() + 1e-6 {
        return Err(SolveError::Configuration(format!(
            "initial SOC {} kWh outside [{}, {}]",
            soc0,
            battery.min_energy_kwh(),
            battery.max_energy_kwh()
        )));
    }
    if params.month_peak_kw < 0.0 {
        return Err(SolveError::Configuration(
            "month peak baseline must be non-negative".into(),
        ));
    }

    let mut diagnostics = Diagnostics::new();
    tariff.check_marginal_monotonicity(&mut diagnostics);

    let dt = window.grid.step_hours();
    let n_brackets = tariff.brackets.len();
    let penalty_mode = params.mode.is_penalty();
    let penalty_per_kw = match params.mode {
        PeakMode::RollingPenalty { penalty_per_kw } => {
            if !(penalty_per_kw >= 0.0 && penalty_per_kw.is_finite()) {
                return Err(SolveError::Configuration(format!(
                    "peak penalty must be finite and non-negative, got {}",
                    penalty_per_kw
                )));
            }
            penalty_per_kw
        }
        PeakMode::MonthlyTight => 0.0,
    };

    let layout = VarLayout {
        steps: w,
        n_brackets,
        penalty_mode,
    };
    let n_vars = layout.n_vars();

    let effective_price_import: Vec<f64> = window
        .price_import
        .iter()
        .zip(window.tou_peak)
        .map(|(spot, tou)| tariff.effective_import_price(*spot, *tou))
        .collect();
    let incremental_costs = tariff.incremental_costs();
    let degradation_weight = battery.degradation_weight();
    let calendar_aging_step = battery.calendar_aging_per_step(dt);
    let rho = battery.cyclic_aging_coeff;
    let e_nom = battery.capacity_kwh;

    let mut asm = Assembler::new();
    let mut rows = RowMap::default();

    // ------------------------------------------------------------------
    // Equalities
    // ------------------------------------------------------------------

    // Power balance: imp + η_inv·dch − exp − ch/η_inv − cur = load − pv
    let eta_inv = battery.eta_inverter;
    for t in 0..w {
        let row = asm.push_eq(
            &[
                (layout.import(t), 1.0),
                (layout.discharge(t), eta_inv),
                (layout.export(t), -1.0),
                (layout.charge(t), -1.0 / eta_inv),
                (layout.curtail(t), -1.0),
            ],
            window.load_kw[t] - window.pv_kw[t],
        );
        rows.balance.push(row);
    }

    // SOC dynamics: e(t) − e(t−1) − η_ch·Δt·ch(t) + Δt/η_dch·dch(t) = [soc0 at t=0]
    let ch_gain = battery.eta_charge * dt;
    let dch_loss = dt / battery.eta_discharge;
    for t in 0..w {
        let mut coeffs = vec![
            (layout.energy(t), 1.0),
            (layout.charge(t), -ch_gain),
            (layout.discharge(t), dch_loss),
        ];
        let rhs = if t == 0 {
            soc0
        } else {
            coeffs.push((layout.energy(t - 1), -1.0));
            0.0
        };
        rows.soc_dynamics.push(asm.push_eq(&coeffs, rhs));
    }

    // Energy delta split: Δ+(t) − Δ−(t) − e(t) + e(t−1) = [−soc0 at t=0]
    for t in 0..w {
        let mut coeffs = vec![
            (layout.delta_pos(t), 1.0),
            (layout.delta_neg(t), -1.0),
            (layout.energy(t), -1.0),
        ];
        let rhs = if t == 0 {
            -soc0
        } else {
            coeffs.push((layout.energy(t - 1), 1.0));
            0.0
        };
        rows.delta_split.push(asm.push_eq(&coeffs, rhs));
    }

    // Normalized throughput: E_nom·DOD(t) − Δ+(t) − Δ−(t) = 0
    for t in 0..w {
        rows.dod_def.push(asm.push_eq(
            &[
                (layout.dod(t), e_nom),
                (layout.delta_pos(t), -1.0),
                (layout.delta_neg(t), -1.0),
            ],
            0.0,
        ));
    }

    // Cyclic aging: DP_cyc(t) − ρ·DOD(t) = 0
    for t in 0..w {
        rows.cyclic_def.push(asm.push_eq(
            &[(layout.dp_cyclic(t), 1.0), (layout.dod(t), -rho)],
            0.0,
        ));
    }

    // Peak definition: P_peak − Σ width_i·z_i = 0 (tight mode with a power
    // tariff; in penalty mode the peak variable is unused and pinned later)
    let tight_with_tariff = !penalty_mode && tariff.has_power_tariff();
    if tight_with_tariff {
        let mut coeffs = vec![(layout.peak(), 1.0)];
        for (i, b) in tariff.brackets.iter().enumerate() {
            coeffs.push((layout.bracket(i), -b.width_kw));
        }
        rows.peak_def = Some(asm.push_eq(&coeffs, 0.0));
    }

    let n_eq_provisional = asm.eq_rhs.len();

    // ------------------------------------------------------------------
    // Inequalities (recorded with provisional indices, offset below)
    // ------------------------------------------------------------------

    // Non-negativity for every variable block; the energy column gets the
    // SOC band instead.
    for t in 0..w {
        for col in [
            layout.charge(t),
            layout.discharge(t),
            layout.import(t),
            layout.export(t),
            layout.curtail(t),
            layout.delta_pos(t),
            layout.delta_neg(t),
            layout.dod(t),
            layout.dp_cyclic(t),
            layout.dp(t),
        ] {
            asm.push_leq(&[(col, -1.0)], 0.0);
        }
        asm.push_leq(&[(layout.energy(t), -1.0)], -battery.min_energy_kwh());
        if penalty_mode {
            asm.push_leq(&[(layout.violation(t), -1.0)], 0.0);
        }
    }
    for i in 0..n_brackets {
        asm.push_leq(&[(layout.bracket(i), -1.0)], 0.0);
    }
    asm.push_leq(&[(layout.peak(), -1.0)], 0.0);

    // Upper bounds
    for t in 0..w {
        asm.push_leq(&[(layout.charge(t), 1.0)], battery.max_charge_kw);
        asm.push_leq(&[(layout.discharge(t), 1.0)], battery.max_discharge_kw);
        asm.push_leq(&[(layout.energy(t), 1.0)], battery.max_energy_kwh());
        if let Some(cap) = limits.import_limit_kw {
            rows.import_cap
                .push(asm.push_leq(&[(layout.import(t), 1.0)], cap));
        }
        if let Some(cap) = limits.export_limit_kw {
            rows.export_cap
                .push(asm.push_leq(&[(layout.export(t), 1.0)], cap));
        }
    }
    for i in 0..n_brackets {
        asm.push_leq(&[(layout.bracket(i), 1.0)], 1.0);
    }
    // A zero-capacity battery pins the aging chain: the DOD definition row
    // degenerates to 0 = 0 and leaves DOD free, so close it here.
    if e_nom <= 0.0 {
        for t in 0..w {
            asm.push_leq(&[(layout.dod(t), 1.0)], 0.0);
            asm.push_leq(&[(layout.dp(t), 1.0)], calendar_aging_step);
        }
    }
    if !tight_with_tariff {
        // Peak variable is not tied to the brackets; pin it so the primal
        // is deterministic.
        asm.push_leq(&[(layout.peak(), 1.0)], 0.0);
    }

    // Bracket ordering: z_i ≤ z_{i−1}
    for i in 1..n_brackets {
        rows.bracket_order.push(asm.push_leq(
            &[(layout.bracket(i), 1.0), (layout.bracket(i - 1), -1.0)],
            0.0,
        ));
    }

    // Peak linking
    if tight_with_tariff {
        for t in 0..w {
            rows.peak_track.push(asm.push_leq(
                &[(layout.import(t), 1.0), (layout.peak(), -1.0)],
                0.0,
            ));
        }
        // Demand charges already committed this month cannot be optimized
        // away: P_peak ≥ month_peak_kw.
        if params.month_peak_kw > 0.0 {
            rows.peak_baseline =
                Some(asm.push_leq(&[(layout.peak(), -1.0)], -params.month_peak_kw));
        }
    } else if penalty_mode {
        for t in 0..w {
            rows.violation_link.push(asm.push_leq(
                &[(layout.import(t), 1.0), (layout.violation(t), -1.0)],
                params.month_peak_kw,
            ));
        }
    }

    // Degradation max: DP(t) ≥ DP_cyc(t), DP(t) ≥ r_cal·Δt
    for t in 0..w {
        rows.dp_ge_cyclic.push(asm.push_leq(
            &[(layout.dp_cyclic(t), 1.0), (layout.dp(t), -1.0)],
            0.0,
        ));
        rows.dp_ge_calendar
            .push(asm.push_leq(&[(layout.dp(t), -1.0)], -calendar_aging_step));
    }

    // ------------------------------------------------------------------
    // Objective
    // ------------------------------------------------------------------

    let mut objective = vec![0.0; n_vars];
    for t in 0..w {
        objective[layout.import(t)] = effective_price_import[t] * dt;
        objective[layout.export(t)] = -window.price_export[t] * dt;
        objective[layout.dp(t)] = degradation_weight;
        if penalty_mode {
            objective[layout.violation(t)] = penalty_per_kw;
        }
    }
    for (i, c) in incremental_costs.iter().enumerate() {
        objective[layout.bracket(i)] = *c;
    }

    // ------------------------------------------------------------------
    // Finish: merge equalities and inequalities, offset tracked rows
    // ------------------------------------------------------------------

    let (a, rhs, n_eq, n_ineq) = asm.finish(n_vars);
    debug_assert_eq!(n_eq, n_eq_provisional);

    let offset = |v: &mut Vec<usize>| {
        for r in v.iter_mut() {
            *r += n_eq;
        }
    };
    offset(&mut rows.bracket_order);
    offset(&mut rows.peak_track);
    offset(&mut rows.violation_link);
    offset(&mut rows.dp_ge_cyclic);
    offset(&mut rows.dp_ge_calendar);
    offset(&mut rows.import_cap);
    offset(&mut rows.export_cap);
    if let Some(r) = rows.peak_baseline.as_mut() {
        *r += n_eq;
    }

    Ok(DispatchProblem {
        layout,
        rows,
        a,
        rhs,
        n_eq,
        n_ineq,
        objective,
        grid: window.grid.clone(),
        effective_price_import,
        price_export: window.price_export.to_vec(),
        incremental_costs,
        degradation_weight,
        calendar_aging_step,
        cyclic_aging_coeff: rho,
        capacity_kwh: e_nom,
        penalty_per_kw,
        params,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bdt_core::{EnergyRates, ExogenousSeries, PowerBracket, Resolution, TimeGrid};
    use chrono::NaiveDate;

    fn series(len: usize) -> ExogenousSeries {
        let start = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let grid = TimeGrid::new(start, Resolution::Hourly, len).unwrap();
        ExogenousSeries::new(
            grid,
            vec![0.0; len],
            vec![10.0; len],
            vec![1.0; len],
            vec![0.9; len],
            vec![false; len],
        )
        .unwrap()
    }

    fn battery() -> BatterySpec {
        BatterySpec {
            capacity_kwh: 50.0,
            max_charge_kw: 10.0,
            max_discharge_kw: 10.0,
            soc_min: 0.1,
            soc_max: 0.9,
            eta_charge: 0.95,
            eta_discharge: 0.95,
            eta_inverter: 1.0,
            cell_cost_per_kwh: 300.0,
            eol_fraction: 0.2,
            cyclic_aging_coeff: 1e-4,
            calendar_aging_per_hour: 1e-7,
        }
    }

    fn tariff() -> TariffSpec {
        TariffSpec {
            energy: EnergyRates {
                peak_per_kwh: 0.2,
                offpeak_per_kwh: 0.1,
            },
            brackets: vec![
                PowerBracket {
                    width_kw: 10.0,
                    cumulative_cost: 100.0,
                },
                PowerBracket {
                    width_kw: 10.0,
                    cumulative_cost: 300.0,
                },
            ],
        }
    }

    #[test]
    fn test_layout_is_dense_and_distinct() {
        let layout = VarLayout {
            steps: 4,
            n_brackets: 2,
            penalty_mode: true,
        };
        let mut seen = std::collections::HashSet::new();
        for t in 0..4 {
            for col in [
                layout.charge(t),
                layout.discharge(t),
                layout.import(t),
                layout.export(t),
                layout.energy(t),
                layout.curtail(t),
                layout.delta_pos(t),
                layout.delta_neg(t),
                layout.dod(t),
                layout.dp_cyclic(t),
                layout.dp(t),
                layout.violation(t),
            ] {
                assert!(seen.insert(col));
            }
        }
        assert!(seen.insert(layout.bracket(0)));
        assert!(seen.insert(layout.bracket(1)));
        assert!(seen.insert(layout.peak()));
        assert_eq!(seen.len(), layout.n_vars());
        assert_eq!(*seen.iter().max().unwrap() + 1, layout.n_vars());
    }

    #[test]
    fn test_build_tight_window_shapes() {
        let s = series(24);
        let p = build_window(
            &s.full_window(),
            &battery(),
            &tariff(),
            &GridLimits::unlimited(),
            WindowParams {
                initial_soc_kwh: 25.0,
                month_peak_kw: 0.0,
                mode: PeakMode::MonthlyTight,
            },
        )
        .unwrap();

        assert_eq!(p.a.cols(), p.layout.n_vars());
        assert_eq!(p.a.rows(), p.n_eq + p.n_ineq);
        assert_eq!(p.rhs.len(), p.n_eq + p.n_ineq);
        // 5 equality classes of W rows each, plus the peak definition
        assert_eq!(p.n_eq, 5 * 24 + 1);
        assert_eq!(p.rows.peak_track.len(), 24);
        assert!(p.rows.violation_link.is_empty());
        assert_eq!(p.rows.bracket_order.len(), 1);
        // Sparse by a wide margin
        assert!(p.density() < 0.05);
    }

    #[test]
    fn test_build_penalty_window_shapes() {
        let s = series(24);
        let p = build_window(
            &s.full_window(),
            &battery(),
            &tariff(),
            &GridLimits::unlimited(),
            WindowParams {
                initial_soc_kwh: 25.0,
                month_peak_kw: 12.0,
                mode: PeakMode::RollingPenalty { penalty_per_kw: 3.0 },
            },
        )
        .unwrap();

        // No peak definition row in penalty mode
        assert_eq!(p.n_eq, 5 * 24);
        assert!(p.rows.peak_def.is_none());
        assert_eq!(p.rows.violation_link.len(), 24);
        assert!(p.rows.peak_track.is_empty());
        // Violation columns share the month-peak baseline as rhs
        for &row in &p.rows.violation_link {
            assert_eq!(p.rhs[row], 12.0);
        }
    }

    #[test]
    fn test_objective_coefficients() {
        let s = series(24);
        let p = build_window(
            &s.full_window(),
            &battery(),
            &tariff(),
            &GridLimits::unlimited(),
            WindowParams {
                initial_soc_kwh: 25.0,
                month_peak_kw: 0.0,
                mode: PeakMode::MonthlyTight,
            },
        )
        .unwrap();

        // Off-peak band: 1.0 spot + 0.1 energy rate, Δt = 1
        assert!((p.objective[p.layout.import(0)] - 1.1).abs() < 1e-12);
        assert!((p.objective[p.layout.export(0)] + 0.9).abs() < 1e-12);
        assert!((p.objective[p.layout.bracket(0)] - 100.0).abs() < 1e-12);
        assert!((p.objective[p.layout.bracket(1)] - 200.0).abs() < 1e-12);
        let weight = 300.0 * 50.0 / 0.2;
        assert!((p.objective[p.layout.dp(3)] - weight).abs() < 1e-9);
    }

    #[test]
    fn test_initial_soc_out_of_band_rejected() {
        let s = series(4);
        let err = build_window(
            &s.full_window(),
            &battery(),
            &tariff(),
            &GridLimits::unlimited(),
            WindowParams {
                initial_soc_kwh: 1.0, // below soc_min·E_nom = 5
                month_peak_kw: 0.0,
                mode: PeakMode::MonthlyTight,
            },
        );
        assert!(matches!(err, Err(SolveError::Configuration(_))));
    }

    #[test]
    fn test_negative_penalty_rejected() {
        let s = series(4);
        let err = build_window(
            &s.full_window(),
            &battery(),
            &tariff(),
            &GridLimits::unlimited(),
            WindowParams {
                initial_soc_kwh: 25.0,
                month_peak_kw: 0.0,
                mode: PeakMode::RollingPenalty {
                    penalty_per_kw: -1.0,
                },
            },
        );
        assert!(matches!(err, Err(SolveError::Configuration(_))));
    }
}
