/// Reflect an index into `[0, len)` without repeating the border pixel.
///
/// This is the `gfedcb|abcdefgh|gfedcba` extrapolation.
///
/// PRECONDITION: `len > 0`.
#[inline]
pub fn reflect_101(mut i: isize, len: usize) -> usize {
    let len = len as isize;
    if len == 1 {
        return 0;
    }
    loop {
        if i < 0 {
            i = -i;
        } else if i >= len {
            i = 2 * len - i - 2;
        } else {
            return i as usize;
        }
    }
}

/// Clamp an index into `[0, len)` repeating the border pixel.
#[inline]
pub fn replicate(i: isize, len: usize) -> usize {
    i.clamp(0, len as isize - 1) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reflect_101() {
        assert_eq!(reflect_101(-1, 5), 1);
        assert_eq!(reflect_101(-2, 5), 2);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(6, 5), 2);
        assert_eq!(reflect_101(3, 5), 3);
        assert_eq!(reflect_101(-3, 1), 0);
    }

    #[test]
    fn test_replicate() {
        assert_eq!(replicate(-4, 5), 0);
        assert_eq!(replicate(7, 5), 4);
        assert_eq!(replicate(2, 5), 2);
    }
}
