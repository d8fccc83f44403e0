//! Canned drilling cycles (G73, G81, G82, G83, G85, G89).
//!
//! Each cycle expands into primitive rapid and feed moves from the current
//! position to the parametric target: position over the hole, plunge
//! (optionally pecking), dwell, and retract to the initial Z or the R
//! plane depending on G98/G99. P (dwell), Q (peck depth) and the plunge
//! depth Z are sticky across invocations.

use mill_motion::{Board, FloatPoint, MachineModel, OperatorPanel};

use crate::exec::{rapid_move, Interpreter};
use crate::link::HostLink;
use crate::parser::ParsedLine;

impl Interpreter {
    pub(crate) fn drill_cycle<B, U, L>(
        &mut self,
        code: i32,
        mut fp: FloatPoint,
        parsed: &ParsedLine,
        machine: &mut MachineModel<B, U>,
        link: &mut L,
    ) where
        B: Board,
        U: OperatorPanel,
        L: HostLink,
    {
        let mut dwell_ms = 0u32;
        let mut delta = 0.0f32;
        let mut slow_retract = false;
        let mut full_retract = true;

        let old_z = machine.local_position.z;
        fp.z = old_z;

        // Shared validation: a hole needs a position, loop counts must be
        // positive, the rotary axes make no sense here, and cutter radius
        // compensation would shift the hole.
        let mut error = !(parsed.x.is_some() || parsed.y.is_some())
            || parsed.l.map_or(false, |l| l <= 0)
            || parsed.a_seen
            || parsed.e_seen
            || parsed.b.is_some()
            || machine.cutter_radius_compensation() != 0;

        match code {
            85 | 81 => {
                slow_retract = code == 85;
            }
            89 | 82 => {
                slow_retract = code == 89;
                let p = parsed.p.unwrap_or(machine.sticky_p);
                if p < 0.0 {
                    error = true;
                }
                dwell_ms = p as u32;
                machine.sticky_p = p;
            }
            73 | 83 => {
                full_retract = code == 83;
                let q = parsed.q.unwrap_or(machine.sticky_q);
                if q <= 0.0 {
                    error = true;
                }
                delta = q;
                machine.sticky_q = q;
            }
            _ => {}
        }

        if error {
            self.report_error(
                link,
                format_args!("Dud G code: G{} with invalid or missing parameters", code),
            );
            self.request_resend(link);
            return;
        }

        // The plunge depth is sticky like P and Q.
        let z_target = parsed.z.unwrap_or(self.sticky_z);
        self.sticky_z = z_target;

        let mut loops = parsed.l.unwrap_or(1);
        if let Some(r) = parsed.r {
            machine.set_retract_height(r);
        }

        // Never approach the hole below the retract plane.
        if fp.z < machine.retract_height() {
            let mut lift = machine.local_position;
            lift.z = machine.retract_height();
            rapid_move(machine, lift);
            fp.z = machine.retract_height();
        }

        while loops > 0 {
            loops -= 1;

            // Position over the hole, then make sure we sit on the R plane.
            rapid_move(machine, fp);
            if fp.z != machine.retract_height() {
                fp.z = machine.retract_height();
                rapid_move(machine, fp);
            }

            if delta > 0.0 {
                // Peck: descend by Q, back off, re-enter half a unit above
                // the bottom of the previous peck.
                let mut z = fp.z;
                while z > z_target {
                    z -= delta;
                    if z < z_target {
                        z = z_target;
                    }
                    fp.z = z;
                    machine.q_move(fp);

                    if z > z_target {
                        fp.z = if full_retract {
                            machine.retract_height()
                        } else {
                            z + machine.clearance_increment()
                        };
                        rapid_move(machine, fp);
                        fp.z = z - 0.5;
                        rapid_move(machine, fp);
                    }
                }
            } else {
                fp.z = z_target;
                machine.q_move(fp);
            }

            if dwell_ms > 0 {
                machine.wait_for_q_empty();
                machine.dwell(dwell_ms);
            }

            fp.z = if loops == 0 && machine.retract_mode() {
                old_z
            } else {
                machine.retract_height()
            };
            if slow_retract {
                machine.q_move(fp);
            } else {
                rapid_move(machine, fp);
            }

            // In incremental mode each extra loop advances to the next hole.
            if loops > 0 && !machine.abs_mode() {
                if let Some(x) = parsed.x {
                    fp.x += x;
                }
                if let Some(y) = parsed.y {
                    fp.y += y;
                }
            }
        }
    }
}
