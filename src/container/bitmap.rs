use std::{
    fmt::{self, Debug},
    hash::{Hash, Hasher},
};

// 一个简单的bitmap,用来记录物理寄存器集合(保留寄存器,regmask破坏的寄存器等)
#[derive(Clone)]
pub struct Bitmap {
    arr: Vec<u64>,
    len: usize, //记录元素数量
}

impl Bitmap {
    pub fn and_other(&mut self, other: &Bitmap) {
        for i in 0..self.arr.len() {
            self.arr[i] &= other.arr.get(i).copied().unwrap_or(0);
        }
        self.recount();
    }
    pub fn or_other(&mut self, other: &Bitmap) {
        while other.cap() > self.arr.len() {
            self.arr.push(0);
        }
        for i in 0..other.cap() {
            self.arr[i] |= other.arr[i];
        }
        self.recount();
    }

    fn recount(&mut self) {
        self.len = self.arr.iter().map(|v| v.count_ones() as usize).sum();
    }
}

impl Bitmap {
    pub fn new() -> Bitmap {
        Bitmap {
            arr: Vec::new(),
            len: 0,
        }
    }
    //获取元素数量
    pub fn len(&self) -> usize {
        self.len
    }
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
    pub fn insert(&mut self, i: usize) {
        if !self.contains(i) {
            self.len += 1;
        }
        while i / 64 >= self.arr.len() {
            self.arr.push(0);
        }
        let v = &mut self.arr[i / 64];
        *v |= 1 << (i as u64 % 64)
    }
    pub fn remove(&mut self, i: usize) -> bool {
        if !self.contains(i) {
            return false;
        }
        self.len -= 1;
        let v = &mut self.arr[i / 64];
        *v &= !(1 << (i as u64 % 64));
        true
    }

    #[inline]
    pub fn contains(&self, i: usize) -> bool {
        if i / 64 >= self.arr.len() {
            return false;
        }
        let v = self.arr[i / 64];
        v & (1 << (i as u64 % 64)) != 0
    }

    pub fn cap(&self) -> usize {
        self.arr.len()
    }

    pub fn and(a: &Bitmap, b: &Bitmap) -> Bitmap {
        let mut out = a.clone();
        out.and_other(b);
        out
    }
    pub fn or(a: &Bitmap, b: &Bitmap) -> Bitmap {
        let mut out = a.clone();
        out.or_other(b);
        out
    }

    /// 从小到大遍历其中的元素
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.arr.iter().enumerate().flat_map(|(word, v)| {
            let v = *v;
            (0..64usize)
                .filter(move |bit| v & (1u64 << *bit) != 0)
                .map(move |bit| word * 64 + bit)
        })
    }
}

impl Default for Bitmap {
    fn default() -> Self {
        Bitmap::new()
    }
}

impl FromIterator<usize> for Bitmap {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut out = Bitmap::new();
        for i in iter {
            out.insert(i);
        }
        out
    }
}

// 末尾的全0字不影响相等判断
impl PartialEq for Bitmap {
    fn eq(&self, other: &Self) -> bool {
        let n = self.cap().max(other.cap());
        (0..n).all(|i| {
            self.arr.get(i).copied().unwrap_or(0) == other.arr.get(i).copied().unwrap_or(0)
        })
    }
}

impl Eq for Bitmap {}

impl Hash for Bitmap {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len.hash(state);
        let mut n = self.arr.len();
        while n > 0 && self.arr[n - 1] == 0 {
            n -= 1;
        }
        self.arr[..n].hash(state);
    }
}

impl Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod test_bitmap {
    use std::collections::HashSet;

    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::Bitmap;
    #[test]
    fn test_insert() {
        let mut bitmap = Bitmap::new();
        bitmap.insert(33);
        assert!(bitmap.contains(33));
        assert!(!bitmap.contains(32));
        assert!(!bitmap.contains(1000));
    }

    #[test]
    fn test_remove() {
        let mut bitmap = Bitmap::new();
        bitmap.insert(33);
        assert!(bitmap.contains(33));
        assert!(bitmap.remove(33));
        assert!(!bitmap.contains(33));
        assert!(!bitmap.remove(33));
        assert!(!bitmap.remove(4096));
        assert_eq!(bitmap.len(), 0);
    }

    #[test]
    fn test_use() {
        // 随机插入删除,和HashSet的结果对比
        let mut rng = StdRng::seed_from_u64(7);
        let mode: usize = 300;
        let mut set: HashSet<usize> = HashSet::new();
        let mut bitmap = Bitmap::new();
        for _ in 0..20000 {
            let use_val = rng.gen::<usize>() % mode;
            if rng.gen::<bool>() {
                set.insert(use_val);
                bitmap.insert(use_val);
            }
            if rng.gen::<bool>() {
                assert_eq!(set.remove(&use_val), bitmap.remove(use_val));
            }
        }
        assert_eq!(set.len(), bitmap.len());
        for value in set.iter() {
            assert!(bitmap.contains(*value));
        }
        let mut sorted: Vec<usize> = set.into_iter().collect();
        sorted.sort_unstable();
        assert_eq!(bitmap.iter().collect::<Vec<usize>>(), sorted);
    }

    #[test]
    fn test_and_or() {
        let a: Bitmap = [1, 5, 70].iter().copied().collect();
        let b: Bitmap = [5, 6].iter().copied().collect();
        let and = Bitmap::and(&a, &b);
        assert_eq!(and.iter().collect::<Vec<usize>>(), vec![5]);
        assert_eq!(and.len(), 1);
        let or = Bitmap::or(&b, &a);
        assert_eq!(or.iter().collect::<Vec<usize>>(), vec![1, 5, 6, 70]);
        assert_eq!(or.len(), 4);
    }

    #[test]
    fn test_eq() {
        let mut bp1 = Bitmap::new();
        let mut bp2 = Bitmap::new();
        bp1.insert(33);
        bp2.insert(33);
        // 多出来的空字不影响相等
        bp2.insert(200);
        bp2.remove(200);
        assert_eq!(bp1, bp2);
        let mut set = HashSet::new();
        set.insert(bp1);
        assert!(set.contains(&bp2));
    }
}
