//! Longest common subsequence over arbitrary element pairs.

/// Pairs `(x, y)` of a longest common subsequence of `xs` and `ys` under
/// `eq`, in order. Ties keep the earliest elements of `ys`.
pub(crate) fn lcs<A: Copy, B: Copy>(xs: &[A], ys: &[B], eq: impl Fn(A, B) -> bool) -> Vec<(A, B)> {
    let (n, m) = (xs.len(), ys.len());
    // table[i][j] = LCS length of xs[i..] and ys[j..]
    let mut table = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i][j] = if eq(xs[i], ys[j]) {
                table[i + 1][j + 1] + 1
            } else {
                table[i + 1][j].max(table[i][j + 1])
            };
        }
    }

    let mut out = Vec::with_capacity(table[0][0]);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if eq(xs[i], ys[j]) {
            out.push((xs[i], ys[j]));
            i += 1;
            j += 1;
        } else if table[i + 1][j] >= table[i][j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    #[test]
    fn finds_common_order() {
        let xs = ['a', 'b', 'c', 'd'];
        let ys = ['b', 'a', 'c', 'd'];
        let pairs = lcs(&xs, &ys, |x, y| x == y);
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[1..], [('c', 'c'), ('d', 'd')]);
    }

    #[test]
    fn empty_inputs() {
        let none: [u8; 0] = [];
        assert!(lcs(&none, &[1u8, 2], |x, y| x == y).is_empty());
        assert!(lcs(&[1u8], &none, |x, y| x == y).is_empty());
    }
}
