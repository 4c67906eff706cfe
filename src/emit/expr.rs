//! Arithmetic expansion templates.
//!
//! The target machine has no multiply or divide; `*`, `/` and `%` expand
//! into shift-and-add / shift-and-subtract routines over scratch cells
//! 1-5, with cell 0 aliasing the accumulator (`ADD 0` doubles, `SUB 0`
//! zeroes) and cell 10 holding the constant 1 from the prologue.
//!
//! Division floors toward minus infinity; modulus takes the divisor's
//! sign. Constant folding follows the same conventions.

use super::{Emitter, Operand};
use crate::codegen::Opcode;

/// Floored quotient: rounds toward minus infinity.
fn fold_div(a: i64, b: i64) -> i64 {
    if b == 0 {
        return 0;
    }
    let q = a / b;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        q - 1
    } else {
        q
    }
}

/// Remainder matching floored division: takes the divisor's sign.
fn fold_mod(a: i64, b: i64) -> i64 {
    if b == 0 {
        return 0;
    }
    let r = a % b;
    if r != 0 && ((r < 0) != (b < 0)) {
        r + b
    } else {
        r
    }
}

impl Emitter<'_> {
    fn op(&mut self, op: Opcode, arg: i64) -> usize {
        self.code.emit(op, arg)
    }

    /// Zero through `SUB 0`, anything else as an immediate.
    fn load_const(&mut self, value: i64) {
        if value == 0 {
            self.op(Opcode::Sub, 0);
        } else {
            self.op(Opcode::Set, value);
        }
    }

    /// Negates the accumulator through a scratch cell.
    fn negate_acc(&mut self) {
        self.op(Opcode::Store, 1);
        self.op(Opcode::Sub, 1);
        self.op(Opcode::Sub, 1);
    }

    /// `|operand|` into `cell`. Cell operands get a runtime sign test; a
    /// zero value short-circuits the whole template through `end_jumps`
    /// with 0 in the accumulator. Literal operands must be nonzero.
    fn abs_into(&mut self, operand: Operand, cell: i64, end_jumps: &mut Vec<usize>) {
        match operand {
            Operand::Cell(c) => {
                self.op(Opcode::Load, c);
                end_jumps.push(self.op(Opcode::Jzero, 0));
                self.op(Opcode::Jpos, 3);
                self.op(Opcode::Sub, c);
                self.op(Opcode::Sub, c);
                self.op(Opcode::Store, cell);
            }
            Operand::Lit(k) => {
                self.op(Opcode::Set, k.abs());
                self.op(Opcode::Store, cell);
            }
        }
    }

    pub(super) fn add(&mut self, l: Operand, r: Operand) {
        match (l, r) {
            (Operand::Lit(a), Operand::Lit(b)) => self.load_const(a + b),
            (Operand::Cell(lc), Operand::Cell(rc)) => {
                self.op(Opcode::Load, lc);
                self.op(Opcode::Add, rc);
            }
            (Operand::Lit(a), Operand::Cell(rc)) => {
                self.op(Opcode::Set, a);
                self.op(Opcode::Add, rc);
            }
            (Operand::Cell(lc), Operand::Lit(b)) => {
                self.op(Opcode::Set, b);
                self.op(Opcode::Add, lc);
            }
        }
    }

    pub(super) fn sub(&mut self, l: Operand, r: Operand) {
        match (l, r) {
            (Operand::Lit(a), Operand::Lit(b)) => self.load_const(a - b),
            (Operand::Cell(lc), Operand::Cell(rc)) => {
                self.op(Opcode::Load, lc);
                self.op(Opcode::Sub, rc);
            }
            (Operand::Lit(a), Operand::Cell(rc)) => {
                self.op(Opcode::Set, a);
                self.op(Opcode::Sub, rc);
            }
            (Operand::Cell(lc), Operand::Lit(b)) => {
                self.op(Opcode::Set, b);
                self.op(Opcode::Store, 1);
                self.op(Opcode::Load, lc);
                self.op(Opcode::Sub, 1);
            }
        }
    }

    pub(super) fn mul(&mut self, l: Operand, r: Operand) {
        match (l, r) {
            (Operand::Lit(a), Operand::Lit(b)) => self.load_const(a * b),
            (Operand::Cell(c), Operand::Lit(k)) | (Operand::Lit(k), Operand::Cell(c)) => {
                if k == 0 {
                    self.op(Opcode::Sub, 0);
                } else if k.unsigned_abs().is_power_of_two() {
                    // double log2|k| times, fix the sign last
                    self.op(Opcode::Load, c);
                    let mut m = k.unsigned_abs();
                    while m > 1 {
                        self.op(Opcode::Add, 0);
                        m /= 2;
                    }
                    if k < 0 {
                        self.negate_acc();
                    }
                } else {
                    self.mul_general(l, r);
                }
            }
            _ => self.mul_general(l, r),
        }
    }

    /// Signed Russian-peasant multiplication.
    /// Cell 1: |multiplicand|, doubled each round. Cell 2: |multiplier|,
    /// halved each round. Cell 3: the product. Cell 5: parity probe.
    fn mul_general(&mut self, l: Operand, r: Operand) {
        let mut end_jumps = Vec::new();
        self.abs_into(l, 1, &mut end_jumps);
        self.abs_into(r, 2, &mut end_jumps);
        self.op(Opcode::Sub, 0);
        self.op(Opcode::Store, 3);

        let head = self.code.current_line();
        self.op(Opcode::Load, 2);
        self.op(Opcode::Jpos, 2);
        let to_tail = self.op(Opcode::Jump, 0);
        // -(lowest bit of the multiplier): halve, double, subtract
        self.op(Opcode::Half, 0);
        self.op(Opcode::Add, 0);
        self.op(Opcode::Sub, 2);
        self.op(Opcode::Store, 5);
        self.op(Opcode::Load, super::ONE);
        self.op(Opcode::Add, 5);
        self.op(Opcode::Jzero, 2);
        self.op(Opcode::Jump, 4);
        self.op(Opcode::Load, 3);
        self.op(Opcode::Add, 1);
        self.op(Opcode::Store, 3);
        self.op(Opcode::Load, 1);
        self.op(Opcode::Add, 1);
        self.op(Opcode::Store, 1);
        self.op(Opcode::Load, 2);
        self.op(Opcode::Half, 0);
        self.op(Opcode::Store, 2);
        let back = self.op(Opcode::Jump, 0);
        self.code.patch_branch(back, head);
        self.code.patch_branch(to_tail, self.code.current_line());

        self.mul_sign_fix(l, r);
        let end = self.code.current_line();
        for line in end_jumps {
            self.code.patch_branch(line, end);
        }
    }

    /// Loads the product from cell 3, negated when the operand signs
    /// differ. Literal signs resolve at compile time.
    fn mul_sign_fix(&mut self, l: Operand, r: Operand) {
        match (l, r) {
            (Operand::Cell(lc), Operand::Cell(rc)) => {
                self.op(Opcode::Load, lc);
                self.op(Opcode::Jpos, 4);
                self.op(Opcode::Load, rc);
                self.op(Opcode::Jneg, 8);
                self.op(Opcode::Jump, 3);
                self.op(Opcode::Load, rc);
                self.op(Opcode::Jpos, 5);
                self.op(Opcode::Load, 3);
                self.op(Opcode::Sub, 3);
                self.op(Opcode::Sub, 3);
                self.op(Opcode::Jump, 2);
                self.op(Opcode::Load, 3);
            }
            (Operand::Cell(c), Operand::Lit(k)) | (Operand::Lit(k), Operand::Cell(c)) => {
                if k > 0 {
                    self.op(Opcode::Load, c);
                    self.op(Opcode::Jpos, 5);
                    self.op(Opcode::Load, 3);
                    self.op(Opcode::Sub, 3);
                    self.op(Opcode::Sub, 3);
                    self.op(Opcode::Jump, 2);
                    self.op(Opcode::Load, 3);
                } else {
                    self.op(Opcode::Load, c);
                    self.op(Opcode::Jpos, 3);
                    self.op(Opcode::Load, 3);
                    self.op(Opcode::Jump, 4);
                    self.op(Opcode::Load, 3);
                    self.op(Opcode::Sub, 3);
                    self.op(Opcode::Sub, 3);
                }
            }
            (Operand::Lit(a), Operand::Lit(b)) => {
                // folded before reaching the general routine; kept total
                self.op(Opcode::Load, 3);
                if (a < 0) != (b < 0) {
                    self.op(Opcode::Sub, 3);
                    self.op(Opcode::Sub, 3);
                }
            }
        }
    }

    pub(super) fn div(&mut self, l: Operand, r: Operand) {
        match (l, r) {
            (Operand::Lit(a), Operand::Lit(b)) => self.load_const(fold_div(a, b)),
            (_, Operand::Lit(0)) | (Operand::Lit(0), _) => {
                self.op(Opcode::Sub, 0);
            }
            (Operand::Cell(c), Operand::Lit(1)) => {
                self.op(Opcode::Load, c);
            }
            (Operand::Cell(c), Operand::Lit(-1)) => {
                self.op(Opcode::Load, c);
                self.op(Opcode::Sub, 0);
                self.op(Opcode::Sub, c);
            }
            (Operand::Cell(c), Operand::Lit(2)) => {
                self.op(Opcode::Load, c);
                self.op(Opcode::Half, 0);
            }
            (Operand::Cell(c), Operand::Lit(-2)) => {
                // floor(v / -2) = floor(-v / 2)
                self.op(Opcode::Load, c);
                self.op(Opcode::Sub, 0);
                self.op(Opcode::Sub, c);
                self.op(Opcode::Half, 0);
            }
            _ => self.div_general(l, r),
        }
    }

    /// Shift-and-subtract long division on magnitudes.
    /// Cell 1: shifted divisor. Cell 2: quotient bit. Cell 3: quotient.
    /// Cell 4: remainder. Cell 5: |divisor|.
    fn div_general(&mut self, l: Operand, r: Operand) {
        let mut end_jumps = Vec::new();

        // |divisor| into cells 1 and 5
        match r {
            Operand::Cell(c) => {
                self.op(Opcode::Load, c);
                end_jumps.push(self.op(Opcode::Jzero, 0));
                self.op(Opcode::Jpos, 3);
                self.op(Opcode::Sub, c);
                self.op(Opcode::Sub, c);
                self.op(Opcode::Store, 5);
                self.op(Opcode::Store, 1);
            }
            Operand::Lit(k) => {
                self.op(Opcode::Set, k.abs());
                self.op(Opcode::Store, 5);
                self.op(Opcode::Store, 1);
            }
        }
        self.abs_into(l, 4, &mut end_jumps);

        self.op(Opcode::Load, super::ONE);
        self.op(Opcode::Store, 2);
        self.op(Opcode::Sub, 0);
        self.op(Opcode::Store, 3);

        // scale the divisor up past the remainder
        let align = self.code.current_line();
        self.op(Opcode::Load, 4);
        self.op(Opcode::Sub, 1);
        let aligned = self.op(Opcode::Jneg, 0);
        self.op(Opcode::Load, 1);
        self.op(Opcode::Add, 0);
        self.op(Opcode::Store, 1);
        self.op(Opcode::Load, 2);
        self.op(Opcode::Add, 0);
        self.op(Opcode::Store, 2);
        let back = self.op(Opcode::Jump, 0);
        self.code.patch_branch(back, align);
        self.code.patch_branch(aligned, self.code.current_line());
        self.op(Opcode::Load, 2);
        self.op(Opcode::Half, 0);
        self.op(Opcode::Store, 2);
        self.op(Opcode::Load, 1);
        self.op(Opcode::Half, 0);
        self.op(Opcode::Store, 1);

        // subtract while the shifted divisor is at least |divisor|
        let head = self.code.current_line();
        self.op(Opcode::Load, 4);
        self.op(Opcode::Sub, 5);
        let to_tail = self.op(Opcode::Jneg, 0);
        self.op(Opcode::Load, 4);
        self.op(Opcode::Sub, 1);
        self.op(Opcode::Jneg, 7);
        self.op(Opcode::Load, 4);
        self.op(Opcode::Sub, 1);
        self.op(Opcode::Store, 4);
        self.op(Opcode::Load, 3);
        self.op(Opcode::Add, 2);
        self.op(Opcode::Store, 3);
        self.op(Opcode::Load, 2);
        self.op(Opcode::Half, 0);
        self.op(Opcode::Store, 2);
        self.op(Opcode::Load, 1);
        self.op(Opcode::Half, 0);
        self.op(Opcode::Store, 1);
        let back = self.op(Opcode::Jump, 0);
        self.code.patch_branch(back, head);
        self.code.patch_branch(to_tail, self.code.current_line());

        self.div_sign_fix(l, r, &mut end_jumps);
        let end = self.code.current_line();
        for line in end_jumps {
            self.code.patch_branch(line, end);
        }
    }

    /// Floored-division sign tail: same signs load the quotient; differing
    /// signs negate it, minus one more when the remainder is nonzero.
    fn div_sign_fix(&mut self, l: Operand, r: Operand, end_jumps: &mut Vec<usize>) {
        let mut same_jumps = Vec::new();
        let mut diff_jumps = Vec::new();
        match (l, r) {
            (Operand::Cell(lc), Operand::Cell(rc)) => {
                self.op(Opcode::Load, lc);
                self.op(Opcode::Jpos, 4);
                self.op(Opcode::Load, rc);
                same_jumps.push(self.op(Opcode::Jneg, 0));
                diff_jumps.push(self.op(Opcode::Jump, 0));
                self.op(Opcode::Load, rc);
                diff_jumps.push(self.op(Opcode::Jneg, 0));
                same_jumps.push(self.op(Opcode::Jump, 0));
            }
            (Operand::Cell(c), Operand::Lit(k)) | (Operand::Lit(k), Operand::Cell(c)) => {
                self.op(Opcode::Load, c);
                let test = if k > 0 { Opcode::Jneg } else { Opcode::Jpos };
                diff_jumps.push(self.op(test, 0));
                same_jumps.push(self.op(Opcode::Jump, 0));
            }
            (Operand::Lit(a), Operand::Lit(b)) => {
                // folded before reaching the general routine; kept total
                if (a < 0) != (b < 0) {
                    diff_jumps.push(self.op(Opcode::Jump, 0));
                } else {
                    same_jumps.push(self.op(Opcode::Jump, 0));
                }
            }
        }

        if !same_jumps.is_empty() {
            let start = self.code.current_line();
            for line in same_jumps {
                self.code.patch_branch(line, start);
            }
            self.op(Opcode::Load, 3);
            end_jumps.push(self.op(Opcode::Jump, 0));
        }
        if !diff_jumps.is_empty() {
            let start = self.code.current_line();
            for line in diff_jumps {
                self.code.patch_branch(line, start);
            }
            self.op(Opcode::Load, 4);
            self.op(Opcode::Jzero, 4);
            self.op(Opcode::Load, 3);
            self.op(Opcode::Add, super::ONE);
            self.op(Opcode::Store, 3);
            self.op(Opcode::Load, 3);
            self.op(Opcode::Sub, 3);
            self.op(Opcode::Sub, 3);
        }
    }

    pub(super) fn modulo(&mut self, l: Operand, r: Operand) {
        match (l, r) {
            (Operand::Lit(a), Operand::Lit(b)) => self.load_const(fold_mod(a, b)),
            (_, Operand::Lit(0)) | (Operand::Lit(0), _) => {
                self.op(Opcode::Sub, 0);
            }
            (_, Operand::Lit(1)) | (_, Operand::Lit(-1)) => {
                self.op(Opcode::Sub, 0);
            }
            _ => self.mod_general(l, r),
        }
    }

    /// Shift-and-subtract reduction of |dividend| modulo |divisor|.
    /// Cell 1: shifted divisor. Cell 2: remainder. Cell 3: |divisor|.
    fn mod_general(&mut self, l: Operand, r: Operand) {
        let mut end_jumps = Vec::new();

        // |divisor| into cells 1 and 3
        match r {
            Operand::Cell(c) => {
                self.op(Opcode::Load, c);
                end_jumps.push(self.op(Opcode::Jzero, 0));
                self.op(Opcode::Jpos, 3);
                self.op(Opcode::Sub, c);
                self.op(Opcode::Sub, c);
                self.op(Opcode::Store, 3);
                self.op(Opcode::Store, 1);
            }
            Operand::Lit(k) => {
                self.op(Opcode::Set, k.abs());
                self.op(Opcode::Store, 3);
                self.op(Opcode::Store, 1);
            }
        }
        self.abs_into(l, 2, &mut end_jumps);

        // scale the divisor up past the remainder
        let align = self.code.current_line();
        self.op(Opcode::Load, 2);
        self.op(Opcode::Sub, 1);
        let aligned = self.op(Opcode::Jneg, 0);
        self.op(Opcode::Load, 1);
        self.op(Opcode::Add, 0);
        self.op(Opcode::Store, 1);
        let back = self.op(Opcode::Jump, 0);
        self.code.patch_branch(back, align);
        self.code.patch_branch(aligned, self.code.current_line());
        self.op(Opcode::Load, 1);
        self.op(Opcode::Half, 0);
        self.op(Opcode::Store, 1);

        // reduce while the remainder is at least |divisor|
        let head = self.code.current_line();
        self.op(Opcode::Load, 2);
        self.op(Opcode::Sub, 3);
        let to_tail = self.op(Opcode::Jneg, 0);
        self.op(Opcode::Load, 2);
        self.op(Opcode::Sub, 1);
        self.op(Opcode::Jneg, 4);
        self.op(Opcode::Load, 2);
        self.op(Opcode::Sub, 1);
        self.op(Opcode::Store, 2);
        self.op(Opcode::Load, 1);
        self.op(Opcode::Half, 0);
        self.op(Opcode::Store, 1);
        let back = self.op(Opcode::Jump, 0);
        self.code.patch_branch(back, head);
        self.code.patch_branch(to_tail, self.code.current_line());

        self.mod_sign_fix(l, r, &mut end_jumps);
        let end = self.code.current_line();
        for line in end_jumps {
            self.code.patch_branch(line, end);
        }
    }

    /// Euclidean tail over the magnitude remainder `m` (cell 2) and
    /// `|divisor|` (cell 3): `m`, `|b|-m`, `m-|b|` or `-m` by the operand
    /// signs, with a zero remainder short-circuiting to 0.
    fn mod_sign_fix(&mut self, l: Operand, r: Operand, end_jumps: &mut Vec<usize>) {
        // jump lists per sign combination of (dividend, divisor)
        let mut pos_pos = Vec::new();
        let mut neg_pos = Vec::new();
        let mut pos_neg = Vec::new();
        let mut neg_neg = Vec::new();
        match (l, r) {
            (Operand::Cell(lc), Operand::Cell(rc)) => {
                self.op(Opcode::Load, lc);
                self.op(Opcode::Jpos, 4);
                self.op(Opcode::Load, rc);
                neg_neg.push(self.op(Opcode::Jneg, 0));
                neg_pos.push(self.op(Opcode::Jump, 0));
                self.op(Opcode::Load, rc);
                pos_pos.push(self.op(Opcode::Jpos, 0));
                pos_neg.push(self.op(Opcode::Jump, 0));
            }
            (Operand::Cell(c), Operand::Lit(k)) => {
                self.op(Opcode::Load, c);
                if k > 0 {
                    pos_pos.push(self.op(Opcode::Jpos, 0));
                    neg_pos.push(self.op(Opcode::Jump, 0));
                } else {
                    neg_neg.push(self.op(Opcode::Jneg, 0));
                    pos_neg.push(self.op(Opcode::Jump, 0));
                }
            }
            (Operand::Lit(a), Operand::Cell(c)) => {
                self.op(Opcode::Load, c);
                if a > 0 {
                    pos_pos.push(self.op(Opcode::Jpos, 0));
                    pos_neg.push(self.op(Opcode::Jump, 0));
                } else {
                    neg_neg.push(self.op(Opcode::Jneg, 0));
                    neg_pos.push(self.op(Opcode::Jump, 0));
                }
            }
            (Operand::Lit(a), Operand::Lit(b)) => {
                // folded before reaching the general routine; kept total
                let bucket = match (a > 0, b > 0) {
                    (true, true) => &mut pos_pos,
                    (false, true) => &mut neg_pos,
                    (true, false) => &mut pos_neg,
                    (false, false) => &mut neg_neg,
                };
                bucket.push(self.code.emit(Opcode::Jump, 0));
            }
        }

        if !pos_pos.is_empty() {
            let start = self.code.current_line();
            for line in pos_pos {
                self.code.patch_branch(line, start);
            }
            self.op(Opcode::Load, 2);
            end_jumps.push(self.op(Opcode::Jump, 0));
        }
        if !neg_pos.is_empty() {
            let start = self.code.current_line();
            for line in neg_pos {
                self.code.patch_branch(line, start);
            }
            self.op(Opcode::Load, 2);
            end_jumps.push(self.op(Opcode::Jzero, 0));
            self.op(Opcode::Load, 3);
            self.op(Opcode::Sub, 2);
            end_jumps.push(self.op(Opcode::Jump, 0));
        }
        if !pos_neg.is_empty() {
            let start = self.code.current_line();
            for line in pos_neg {
                self.code.patch_branch(line, start);
            }
            self.op(Opcode::Load, 2);
            end_jumps.push(self.op(Opcode::Jzero, 0));
            self.op(Opcode::Sub, 3);
            end_jumps.push(self.op(Opcode::Jump, 0));
        }
        if !neg_neg.is_empty() {
            let start = self.code.current_line();
            for line in neg_neg {
                self.code.patch_branch(line, start);
            }
            self.op(Opcode::Load, 2);
            self.op(Opcode::Sub, 2);
            self.op(Opcode::Sub, 2);
            end_jumps.push(self.op(Opcode::Jump, 0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_div_floors_toward_minus_infinity() {
        assert_eq!(fold_div(7, 2), 3);
        assert_eq!(fold_div(-7, 2), -4);
        assert_eq!(fold_div(7, -2), -4);
        assert_eq!(fold_div(-7, -2), 3);
        assert_eq!(fold_div(6, 2), 3);
        assert_eq!(fold_div(-6, 2), -3);
        assert_eq!(fold_div(5, 0), 0);
    }

    #[test]
    fn fold_mod_takes_divisor_sign() {
        assert_eq!(fold_mod(7, 2), 1);
        assert_eq!(fold_mod(-7, 2), 1);
        assert_eq!(fold_mod(7, -2), -1);
        assert_eq!(fold_mod(-7, -2), -1);
        assert_eq!(fold_mod(-6, 2), 0);
        assert_eq!(fold_mod(5, 0), 0);
        assert_eq!(fold_mod(-5, 3), 1);
        assert_eq!(fold_mod(5, -3), -1);
    }
}
