/// Index into a list, wrapping around at both ends. Panics on an empty list.
pub fn wraparound_get<T>(vec: &[T], idx: isize) -> &T {
    let len = vec.len() as isize;
    let idx = idx % len;
    let idx = if idx >= 0 { idx } else { idx + len };
    &vec[idx as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraparound() {
        let v = vec![1, 2, 3];
        assert_eq!(*wraparound_get(&v, 3), 1);
        assert_eq!(*wraparound_get(&v, -1), 3);
    }
}
