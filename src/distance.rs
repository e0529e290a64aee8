use clap::ValueEnum;
use serde::Serialize;
use utoipa::ToSchema;

/// 向量距离度量
///
/// 相似度阈值的取值依赖于度量方式，因此进程运行期间度量方式固定不变。
#[derive(ValueEnum, Serialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// 余弦距离，即 1 - 余弦相似度，范围 [0, 2]
    Cosine,
    /// 欧氏距离（L2）
    Euclidean,
}

impl Metric {
    /// 计算两个等长向量的距离
    #[inline(always)]
    pub fn distance(self, va: &[f32], vb: &[f32]) -> f32 {
        match self {
            Self::Cosine => cosine(va, vb),
            Self::Euclidean => euclidean(va, vb),
        }
    }
}

/// 余弦距离
///
/// 两个零向量视为完全相同（距离 0），只有一方为零向量时距离为 1
#[inline(always)]
pub fn cosine(va: &[f32], vb: &[f32]) -> f32 {
    let mut dot = 0.;
    let mut na = 0.;
    let mut nb = 0.;
    for (a, b) in va.iter().zip(vb) {
        dot += a * b;
        na += a * a;
        nb += b * b;
    }
    match (na == 0., nb == 0.) {
        (true, true) => 0.,
        (true, false) | (false, true) => 1.,
        // 使用 sqrt(na * nb) 保证相同向量的距离严格为 0
        _ => (1. - dot / (na * nb).sqrt()).max(0.),
    }
}

#[inline(always)]
pub fn euclidean(va: &[f32], vb: &[f32]) -> f32 {
    va.iter().zip(vb).map(|(a, b)| (a - b) * (a - b)).sum::<f32>().sqrt()
}

/// 将向量归一化为单位长度，零向量保持不变
pub fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0. {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-6;

    #[test]
    fn cosine_basic() {
        assert!(cosine(&[1., 0.], &[2., 0.]) < EPS);
        assert!((cosine(&[1., 0.], &[0., 1.]) - 1.).abs() < EPS);
        assert!((cosine(&[1., 0.], &[-1., 0.]) - 2.).abs() < EPS);
    }

    #[test]
    fn cosine_zero_vector() {
        assert_eq!(cosine(&[0., 0.], &[0., 0.]), 0.);
        assert_eq!(cosine(&[0., 0.], &[1., 0.]), 1.);
    }

    #[test]
    fn identical_vectors_are_exactly_zero() {
        let v = [0.3, 0.4, 0.5, 0.6, -0.17, 1e-3];
        assert_eq!(cosine(&v, &v), 0.);
        assert_eq!(euclidean(&v, &v), 0.);
    }

    #[test]
    fn euclidean_basic() {
        assert!((euclidean(&[0., 0.], &[3., 4.]) - 5.).abs() < EPS);
        assert_eq!(Metric::Euclidean.distance(&[1., 2.], &[1., 2.]), 0.);
    }

    #[test]
    fn normalize_unit() {
        let mut v = [3., 4.];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < EPS && (v[1] - 0.8).abs() < EPS);
        let mut z = [0., 0.];
        normalize(&mut z);
        assert_eq!(z, [0., 0.]);
    }
}
