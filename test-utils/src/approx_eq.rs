use ndarray::{ArrayBase, Data, Dimension, IntoDimension, Ix};

/// Compares two "things" with approximate equality.
///
/// # Examples
///
/// This can be used to compare two floating point numbers:
///
/// ```
/// use test_utils::assert_approx_eq;
/// assert_approx_eq!(f64, 0.1 + 0.2, 0.3, ulps = 2);
/// ```
///
/// Or containers of such:
///
/// ```
/// use test_utils::assert_approx_eq;
/// assert_approx_eq!(f64, &[[1.0, 2.], [3., 4.]], vec![[1.0, 2.], [3., 4.]])
/// ```
///
/// Or ndarray arrays:
///
/// ```
/// use ndarray::arr1;
/// use test_utils::assert_approx_eq;
/// assert_approx_eq!(f64, arr1(&[0.25, 0.75]), [0.25, 0.75]);
/// ```
///
/// The number of `ulps` defaults to `2` if not specified.
///
/// # NaN and Infinity Handling
///
/// Two NaN values are treated as "approximately" equal, as are two infinities of the same sign.
/// The assertion checks if something has "an expected outcome", e.g. a log-likelihood of
/// `-inf` for an impossible observation.
#[macro_export]
macro_rules! assert_approx_eq {
    ($t:ty, $left:expr, $right:expr $(,)?) => {
        $crate::assert_approx_eq!($t, $left, $right, epsilon = 0., ulps = 2)
    };
    ($t:ty, $left:expr, $right:expr, ulps = $ulps:expr $(,)?) => {
        $crate::assert_approx_eq!($t, $left, $right, epsilon = 0., ulps = $ulps)
    };
    ($t:ty, $left:expr, $right:expr, epsilon = $epsilon:expr $(,)?) => {
        $crate::assert_approx_eq!($t, $left, $right, epsilon = $epsilon, ulps = 2)
    };
    ($t:ty, $left:expr, $right:expr, epsilon = $epsilon:expr, ulps = $ulps:expr $(,)?) => {{
        let epsilon = $epsilon;
        let ulps = $ulps;
        let left = $left;
        let right = $right;
        let mut left_iter = $crate::ApproxEqIter::indexed_iter_logical_order(&left, Vec::new());
        let mut right_iter = $crate::ApproxEqIter::indexed_iter_logical_order(&right, Vec::new());
        loop {
            match (left_iter.next(), right_iter.next()) {
                (Some((lidx, lv)), Some((ridx, rv))) => {
                    std::assert_eq!(
                        lidx, ridx,
                        "Dimensionality mismatch when iterating in logical order: {:?} != {:?}",
                        lidx, ridx
                    );
                    let lv = lv as $t;
                    let rv = rv as $t;
                    let both_nan = lv.is_nan() && rv.is_nan();
                    let same_infinity = lv.is_infinite() && lv == rv;
                    if !both_nan && !same_infinity {
                        std::assert!(
                            $crate::approx_eq!($t, lv, rv, ulps = ulps, epsilon = epsilon),
                            "approximated equal assertion failed (ulps={ulps:?}, epsilon={epsilon:?}) at index {idx:?}: {lv:?} == {rv:?}",
                            ulps=ulps,
                            epsilon=epsilon,
                            lv=lv,
                            rv=rv,
                            idx=lidx,
                        );
                    }
                }
                (Some(pair), None) => {
                    std::panic!("Left input is longer starting with from index {:?}", pair);
                }
                (None, Some(pair)) => {
                    std::panic!("Right input is longer starting with from index {:?}", pair);
                }
                (None, None) => break,
            }
        }
    }};
}

/// Helper trait for the [`assert_approx_eq!`] macro.
///
/// It is implemented on a `&`-reference to the thing that should be compared, both for
/// containers and leaf values (e.g. `&f64`).
///
/// Only use it for [`assert_approx_eq!`].
pub trait ApproxEqIter<'a>: Copy {
    /// The leaf element, e.g. f64.
    type LeafElement;

    /// Flattened iterates over all leaf elements in this instance.
    ///
    /// Leaf values yield a single tuple of their value and the passed in index prefix.
    /// Sequential containers yield a tuple for each element, with the element index pushed onto
    /// the `index_prefix`.
    fn indexed_iter_logical_order(
        self,
        index_prefix: Vec<Ix>,
    ) -> Box<dyn Iterator<Item = (Vec<Ix>, Self::LeafElement)> + 'a>;
}

macro_rules! impl_leaf {
    ($($leaf:ty),+) => {$(
        impl<'a> ApproxEqIter<'a> for &'a $leaf {
            type LeafElement = $leaf;

            fn indexed_iter_logical_order(
                self,
                prefix: Vec<Ix>,
            ) -> Box<dyn Iterator<Item = (Vec<Ix>, Self::LeafElement)> + 'a> {
                Box::new(std::iter::once((prefix, *self)))
            }
        }
    )+};
}

impl_leaf!(f32, f64);

impl<'a, T> ApproxEqIter<'a> for &'a &'a T
where
    &'a T: ApproxEqIter<'a>,
    T: 'a + ?Sized,
{
    type LeafElement = <&'a T as ApproxEqIter<'a>>::LeafElement;

    fn indexed_iter_logical_order(
        self,
        prefix: Vec<Ix>,
    ) -> Box<dyn Iterator<Item = (Vec<Ix>, Self::LeafElement)> + 'a> {
        (*self).indexed_iter_logical_order(prefix)
    }
}

impl<'a, T: 'a> ApproxEqIter<'a> for &'a Vec<T>
where
    &'a T: ApproxEqIter<'a>,
{
    type LeafElement = <&'a T as ApproxEqIter<'a>>::LeafElement;

    fn indexed_iter_logical_order(
        self,
        prefix: Vec<Ix>,
    ) -> Box<dyn Iterator<Item = (Vec<Ix>, Self::LeafElement)> + 'a> {
        self.as_slice().indexed_iter_logical_order(prefix)
    }
}

impl<'a, T, const N: usize> ApproxEqIter<'a> for &'a [T; N]
where
    &'a T: ApproxEqIter<'a>,
{
    type LeafElement = <&'a T as ApproxEqIter<'a>>::LeafElement;

    fn indexed_iter_logical_order(
        self,
        prefix: Vec<Ix>,
    ) -> Box<dyn Iterator<Item = (Vec<Ix>, Self::LeafElement)> + 'a> {
        self.as_ref().indexed_iter_logical_order(prefix)
    }
}

impl<'a, T: 'a> ApproxEqIter<'a> for &'a [T]
where
    &'a T: ApproxEqIter<'a>,
{
    type LeafElement = <&'a T as ApproxEqIter<'a>>::LeafElement;

    fn indexed_iter_logical_order(
        self,
        prefix: Vec<Ix>,
    ) -> Box<dyn Iterator<Item = (Vec<Ix>, Self::LeafElement)> + 'a> {
        let iter = self.iter().enumerate().flat_map(move |(idx, el)| {
            let mut new_prefix = prefix.clone();
            new_prefix.push(idx);
            el.indexed_iter_logical_order(new_prefix)
        });

        Box::new(iter)
    }
}

impl<'a, S, D> ApproxEqIter<'a> for &'a ArrayBase<S, D>
where
    S: Data,
    S::Elem: Copy,
    &'a S::Elem: ApproxEqIter<'a>,
    D: Dimension,
{
    type LeafElement = S::Elem;

    fn indexed_iter_logical_order(
        self,
        prefix: Vec<Ix>,
    ) -> Box<dyn Iterator<Item = (Vec<Ix>, Self::LeafElement)> + 'a> {
        let iter = self.indexed_iter().map(move |(idx, elm)| {
            let mut new_prefix = prefix.clone();
            new_prefix.extend(idx.into_dimension().as_array_view().iter());
            (new_prefix, *elm)
        });

        Box::new(iter)
    }
}
