use crate::*;
use crypto_bigint::modular::runtime_mod::{DynResidue, DynResidueParams};
use crypto_bigint::{Encoding, Integer, NonZero, RandomMod};
use rand_core::{CryptoRng, RngCore};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Domain tag prefixed to every hash-to-group input
const HASH_TO_GROUP_TAG: &[u8] = b"returncodes/hash-to-group";

/// Attempts before `hash_to_element` gives up (each attempt fails with probability ~1/q)
const HASH_TO_GROUP_ATTEMPTS: u32 = 64;

/// Attempts before `derive_exponent` gives up (each attempt fails with probability < 1/2)
const DERIVE_EXPONENT_ATTEMPTS: u32 = 128;

/// The subgroup of prime order q of Z*_p, generated by g
///
/// All group elements and exponents handled by the crate belong to exactly one `ZpSubgroup`.
/// Exponentiation is done in Montgomery form and is bounded by the public bit length of q,
/// so its running time does not depend on the bit pattern of the exponent.
#[derive(Clone, Debug)]
pub struct ZpSubgroup {
    p: BigInt,
    q: BigInt,
    g: BigInt,
    p_params: DynResidueParams<LIMBS>,
    q_params: DynResidueParams<LIMBS>,
    q_modulus: NonZero<BigInt>,
    p_modulus: NonZero<BigInt>,
    q_bits: usize,
    q_bytes: usize,
    p_bytes: usize,
    cofactor: BigInt,
    cofactor_bits: usize,
}

impl PartialEq for ZpSubgroup {
    fn eq(&self, other: &Self) -> bool {
        self.p == other.p && self.q == other.q && self.g == other.g
    }
}

impl Eq for ZpSubgroup {}

impl ZpSubgroup {
    /// Build a group from (p, q, g), checking its structure
    ///
    /// Primality is not checked here, see `validate_primality`.
    pub fn new(p: BigInt, q: BigInt, g: BigInt) -> Result<Self, GroupError> {
        let three = BigInt::from_u8(3);
        if p <= three || !bool::from(Integer::is_odd(&p)) {
            return Err(GroupError::InvalidParameters("p must be an odd integer greater than 3"));
        }
        if q <= BigInt::ONE || !bool::from(Integer::is_odd(&q)) || q >= p {
            return Err(GroupError::InvalidParameters("q must be an odd integer in (1, p)"));
        }

        let q_modulus: NonZero<BigInt> = Option::from(NonZero::new(q))
            .ok_or(GroupError::InvalidParameters("q must not be zero"))?;
        let p_modulus: NonZero<BigInt> = Option::from(NonZero::new(p))
            .ok_or(GroupError::InvalidParameters("p must not be zero"))?;

        let (cofactor, remainder) = p.wrapping_sub(&BigInt::ONE).div_rem(&q_modulus);
        if remainder != BigInt::ZERO {
            return Err(GroupError::InvalidParameters("q must divide p - 1"));
        }

        let group = ZpSubgroup {
            p,
            q,
            g,
            p_params: DynResidueParams::new(&p),
            q_params: DynResidueParams::new(&q),
            q_modulus,
            p_modulus,
            q_bits: q.bits_vartime(),
            q_bytes: (q.bits_vartime() + 7) / 8,
            p_bytes: (p.bits_vartime() + 7) / 8,
            cofactor,
            cofactor_bits: cofactor.bits_vartime(),
        };

        if g == BigInt::ONE || !group.is_member(&g) {
            return Err(GroupError::InvalidParameters(
                "g must be a non-identity member of the order-q subgroup",
            ));
        }

        Ok(group)
    }

    /// Probabilistic primality check of p and q
    pub fn validate_primality(&self) -> Result<(), GroupError> {
        if !crypto_primes::is_prime(&self.p) {
            return Err(GroupError::InvalidParameters("p is not prime"));
        }
        if !crypto_primes::is_prime(&self.q) {
            return Err(GroupError::InvalidParameters("q is not prime"));
        }
        Ok(())
    }

    pub fn p(&self) -> &BigInt {
        &self.p
    }

    pub fn q(&self) -> &BigInt {
        &self.q
    }

    pub fn parameters(&self) -> GroupParameters {
        GroupParameters {
            p: HexInteger(self.p),
            q: HexInteger(self.q),
            g: HexInteger(self.g),
        }
    }

    pub fn generator(&self) -> GroupElement {
        GroupElement { value: self.g }
    }

    pub fn identity(&self) -> GroupElement {
        GroupElement {
            value: BigInt::ONE,
        }
    }

    /// Check that `candidate` lies in [1, p-1] and that candidate^q = 1 (mod p)
    pub fn is_member(&self, candidate: &BigInt) -> bool {
        if *candidate == BigInt::ZERO || *candidate >= self.p {
            return false;
        }
        let check = DynResidue::new(candidate, self.p_params)
            .pow_bounded_exp(&self.q, self.q_bits)
            .retrieve();
        check == BigInt::ONE
    }

    /// The only way to turn an untrusted integer into a `GroupElement`
    pub fn element(&self, value: BigInt) -> Result<GroupElement, GroupError> {
        if !self.is_member(&value) {
            return Err(GroupError::InvalidGroupElement);
        }
        Ok(GroupElement { value })
    }

    // An element built in another group may still be below p, so membership is
    // checked in full for every operand.
    fn check(&self, element: &GroupElement) -> Result<(), GroupError> {
        if !self.is_member(&element.value) {
            return Err(GroupError::InvalidGroupElement);
        }
        Ok(())
    }

    fn residue(&self, element: &GroupElement) -> DynResidue<LIMBS> {
        DynResidue::new(&element.value, self.p_params)
    }

    /// base^exponent (mod p)
    pub fn pow(&self, base: &GroupElement, exponent: &Exponent) -> Result<GroupElement, GroupError> {
        self.check(base)?;
        let value = self
            .residue(base)
            .pow_bounded_exp(&exponent.value, self.q_bits)
            .retrieve();
        Ok(GroupElement { value })
    }

    /// g^exponent (mod p)
    pub fn pow_generator(&self, exponent: &Exponent) -> GroupElement {
        let value = DynResidue::new(&self.g, self.p_params)
            .pow_bounded_exp(&exponent.value, self.q_bits)
            .retrieve();
        GroupElement { value }
    }

    pub fn multiply(&self, a: &GroupElement, b: &GroupElement) -> Result<GroupElement, GroupError> {
        self.check(a)?;
        self.check(b)?;
        let value = (self.residue(a) * self.residue(b)).retrieve();
        Ok(GroupElement { value })
    }

    pub fn inverse(&self, a: &GroupElement) -> Result<GroupElement, GroupError> {
        self.check(a)?;
        let (inverse, invertible) = self.residue(a).invert();
        if !bool::from(invertible) {
            return Err(GroupError::InvalidGroupElement);
        }
        Ok(GroupElement {
            value: inverse.retrieve(),
        })
    }

    /// Accept an integer as an exponent only if it is already reduced mod q
    pub fn exponent(&self, value: BigInt) -> Result<Exponent, GroupError> {
        if value >= self.q {
            return Err(GroupError::InvalidExponent);
        }
        Ok(Exponent { value })
    }

    pub fn exponent_from_u64(&self, value: u64) -> Exponent {
        Exponent {
            value: BigInt::from_u64(value) % self.q_modulus,
        }
    }

    /// Reduce a digest (big-endian) modulo q
    pub fn exponent_from_digest(&self, digest: &[u8]) -> Exponent {
        Exponent {
            value: bigint_from_be_bytes(digest) % self.q_modulus,
        }
    }

    /// Uniformly random exponent in [0, q)
    pub fn random_exponent<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Exponent {
        Exponent {
            value: BigInt::random_mod(rng, &self.q_modulus),
        }
    }

    /// Uniformly random exponent in [1, q), suitable as a private key
    pub fn random_private_exponent<R: RngCore + CryptoRng>(&self, rng: &mut R) -> PrivateExponent {
        loop {
            let exponent = self.random_exponent(rng);
            if !exponent.is_zero() {
                return PrivateExponent(exponent);
            }
        }
    }

    fn exponent_residue(&self, e: &Exponent) -> DynResidue<LIMBS> {
        DynResidue::new(&e.value, self.q_params)
    }

    pub fn add_exponents(&self, a: &Exponent, b: &Exponent) -> Exponent {
        Exponent {
            value: (self.exponent_residue(a) + self.exponent_residue(b)).retrieve(),
        }
    }

    pub fn subtract_exponents(&self, a: &Exponent, b: &Exponent) -> Exponent {
        Exponent {
            value: (self.exponent_residue(a) - self.exponent_residue(b)).retrieve(),
        }
    }

    pub fn multiply_exponents(&self, a: &Exponent, b: &Exponent) -> Exponent {
        Exponent {
            value: (self.exponent_residue(a) * self.exponent_residue(b)).retrieve(),
        }
    }

    pub fn negate_exponent(&self, a: &Exponent) -> Exponent {
        let zero = DynResidue::zero(self.q_params);
        Exponent {
            value: (zero - self.exponent_residue(a)).retrieve(),
        }
    }

    pub fn invert_exponent(&self, a: &Exponent) -> Result<Exponent, GroupError> {
        if a.is_zero() {
            return Err(GroupError::NotInvertible);
        }
        let (inverse, invertible) = self.exponent_residue(a).invert();
        if !bool::from(invertible) {
            return Err(GroupError::NotInvertible);
        }
        Ok(Exponent {
            value: inverse.retrieve(),
        })
    }

    /// Map arbitrary bytes to a non-identity group element
    ///
    /// Expands HKDF(salt = tag, input, info = counter) to the byte length of p, reduces it mod p and raises
    /// it to the cofactor (p-1)/q. Zero and the identity are rejected and the counter advanced.
    pub fn hash_to_element(
        &self,
        hasher: &HashBuilder,
        input: &[u8],
    ) -> Result<GroupElement, HashError> {
        self.hash_to_element_within(hasher, input, HASH_TO_GROUP_ATTEMPTS)
    }

    fn hash_to_element_within(
        &self,
        hasher: &HashBuilder,
        input: &[u8],
        attempts: u32,
    ) -> Result<GroupElement, HashError> {
        let mut wide = vec![0u8; self.p_bytes];
        for counter in 0..attempts {
            hasher.keyed_digest(HASH_TO_GROUP_TAG, input, &counter.to_be_bytes(), &mut wide)?;

            let candidate = bigint_from_be_bytes(&wide) % self.p_modulus;
            if candidate == BigInt::ZERO {
                continue;
            }
            let value = DynResidue::new(&candidate, self.p_params)
                .pow_bounded_exp(&self.cofactor, self.cofactor_bits)
                .retrieve();
            if value != BigInt::ONE {
                return Ok(GroupElement { value });
            }
        }
        Err(HashError::HashToGroupExhausted { attempts })
    }

    /// Derive a non-zero secret exponent from key material
    ///
    /// HKDF(salt = `salt`, ikm = `key`, info = `info` || counter) is expanded to the byte
    /// length of q, masked to the bit length of q and accepted when it lies in [1, q).
    /// Rejection keeps the result uniform.
    pub fn derive_exponent(
        &self,
        hasher: &HashBuilder,
        salt: &[u8],
        key: &[u8],
        info: &[u8],
    ) -> Result<PrivateExponent, HashError> {
        self.derive_exponent_within(hasher, salt, key, info, DERIVE_EXPONENT_ATTEMPTS)
    }

    fn derive_exponent_within(
        &self,
        hasher: &HashBuilder,
        salt: &[u8],
        key: &[u8],
        info: &[u8],
        attempts: u32,
    ) -> Result<PrivateExponent, HashError> {
        let mut wide = Zeroizing::new(vec![0u8; self.q_bytes]);
        let mut labeled = Vec::with_capacity(info.len() + 4);
        let excess_bits = self.q_bytes * 8 - self.q_bits;

        for counter in 0..attempts {
            labeled.clear();
            labeled.extend_from_slice(info);
            labeled.extend_from_slice(&counter.to_be_bytes());
            hasher.keyed_digest(salt, key, &labeled, &mut wide)?;
            wide[0] &= 0xff >> excess_bits;

            let mut value = bigint_from_be_bytes(&wide);
            if value != BigInt::ZERO && value < self.q {
                return Ok(PrivateExponent(Exponent { value }));
            }
            value.zeroize();
        }
        Err(HashError::ExponentDerivationExhausted { attempts })
    }

    /// Canonical fixed-width big-endian encoding, as wide as p
    pub fn to_bytes(&self, element: &GroupElement) -> Vec<u8> {
        let full = element.value.to_be_bytes();
        full[BigInt::BYTES - self.p_bytes..].to_vec()
    }

    pub fn exponent_to_bytes(&self, exponent: &Exponent) -> Vec<u8> {
        let full = exponent.value.to_be_bytes();
        full[BigInt::BYTES - self.p_bytes..].to_vec()
    }
}

/// A member of the order-q subgroup
///
/// Only constructible through `ZpSubgroup::element` or group operations,
/// so holding one means the membership check has passed.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct GroupElement {
    value: BigInt,
}

impl GroupElement {
    pub fn value(&self) -> &BigInt {
        &self.value
    }

    pub fn is_identity(&self) -> bool {
        self.value == BigInt::ONE
    }
}

impl fmt::Debug for GroupElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupElement({})", HexInteger(self.value))
    }
}

impl From<&GroupElement> for HexInteger {
    fn from(element: &GroupElement) -> Self {
        HexInteger(element.value)
    }
}

/// An integer modulo q
#[derive(Clone, PartialEq, Eq, Zeroize)]
pub struct Exponent {
    value: BigInt,
}

impl Exponent {
    pub fn value(&self) -> &BigInt {
        &self.value
    }

    pub fn is_zero(&self) -> bool {
        self.value == BigInt::ZERO
    }
}

impl fmt::Debug for Exponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Exponent({})", HexInteger(self.value))
    }
}

impl From<&Exponent> for HexInteger {
    fn from(exponent: &Exponent) -> Self {
        HexInteger(exponent.value)
    }
}

/// A secret exponent: zeroized on drop, never serialized, redacted in debug output
///
/// Not `Clone`, so a borrowed key cannot be copied out of the scope that lent it:
///
/// ```compile_fail
/// fn keep(key: &returncodes::PrivateExponent) -> returncodes::PrivateExponent {
///     key.clone()
/// }
/// ```
#[derive(PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct PrivateExponent(Exponent);

impl PrivateExponent {
    pub fn new(exponent: Exponent) -> Self {
        PrivateExponent(exponent)
    }

    pub(crate) fn duplicate(&self) -> Self {
        PrivateExponent(self.0.clone())
    }

    pub fn exponent(&self) -> &Exponent {
        &self.0
    }
}

impl fmt::Debug for PrivateExponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateExponent(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_rejects_bad_parameters() {
        let group = test_group();
        let p = *group.p();
        let q = *group.q();

        // g = 1 is the identity
        assert!(ZpSubgroup::new(p, q, BigInt::ONE).is_err());

        // p - 1 has order 2, not q
        assert!(ZpSubgroup::new(p, q, p.wrapping_sub(&BigInt::ONE)).is_err());

        // q does not divide p - 1
        assert!(ZpSubgroup::new(p, q.wrapping_sub(&BigInt::from_u8(2)), BigInt::from_u8(2)).is_err());

        // even p
        assert!(ZpSubgroup::new(p.wrapping_add(&BigInt::ONE), q, BigInt::from_u8(2)).is_err());
    }

    #[test]
    fn test_primality() {
        test_group().validate_primality().unwrap();

        // Structurally sound (9 divides 18 and 4^9 = 1 mod 19) but q is composite
        let composite_q =
            ZpSubgroup::new(BigInt::from_u8(19), BigInt::from_u8(9), BigInt::from_u8(4)).unwrap();
        assert_eq!(
            composite_q.validate_primality(),
            Err(GroupError::InvalidParameters("q is not prime"))
        );
    }

    #[test]
    fn test_membership() {
        let group = test_group();
        assert!(group.is_member(&BigInt::ONE));
        assert!(group.is_member(&BigInt::from_u8(4)));
        assert!(!group.is_member(&BigInt::ZERO));
        assert!(!group.is_member(group.p()));

        // p - 1 = -1 is a non-residue since p = 3 (mod 4)
        let minus_one = group.p().wrapping_sub(&BigInt::ONE);
        assert!(!group.is_member(&minus_one));
        assert_eq!(
            group.element(minus_one),
            Err(GroupError::InvalidGroupElement)
        );
    }

    #[test]
    fn test_arithmetic() {
        let mut rng = ChaCha20Rng::from_seed([1u8; 32]);
        let group = test_group();

        let a = group.random_exponent(&mut rng);
        let b = group.random_exponent(&mut rng);

        // g^a * g^b = g^(a+b)
        let ga = group.pow_generator(&a);
        let gb = group.pow_generator(&b);
        assert_eq!(
            group.multiply(&ga, &gb).unwrap(),
            group.pow_generator(&group.add_exponents(&a, &b))
        );

        // (g^a)^b = g^(ab)
        assert_eq!(
            group.pow(&ga, &b).unwrap(),
            group.pow_generator(&group.multiply_exponents(&a, &b))
        );

        // g^a * (g^a)^-1 = 1
        let inv = group.inverse(&ga).unwrap();
        assert!(group.multiply(&ga, &inv).unwrap().is_identity());
        assert_eq!(inv, group.pow_generator(&group.negate_exponent(&a)));

        // a * a^-1 = 1 (mod q)
        let a_inv = group.invert_exponent(&a).unwrap();
        assert_eq!(
            group.multiply_exponents(&a, &a_inv),
            group.exponent_from_u64(1)
        );
        assert_eq!(
            group.add_exponents(&group.subtract_exponents(&a, &b), &b),
            a
        );

        assert_eq!(
            group.invert_exponent(&group.exponent_from_u64(0)),
            Err(GroupError::NotInvertible)
        );
        assert_eq!(group.exponent(*group.q()), Err(GroupError::InvalidExponent));
    }

    #[test]
    fn test_foreign_elements_rejected() {
        let group = test_group();
        let big = ZpSubgroup::new(
            GroupParameters::rfc3526_2048().p.0,
            GroupParameters::rfc3526_2048().q.0,
            BigInt::from_u8(2),
        )
        .unwrap();

        // A member of the big group that is larger than the small p
        let foreign = big.pow_generator(&big.exponent_from_u64(1000));
        assert!(foreign.value() >= group.p());
        assert_eq!(
            group.pow(&foreign, &group.exponent_from_u64(3)),
            Err(GroupError::InvalidGroupElement)
        );
        assert_eq!(
            group.multiply(&group.generator(), &foreign),
            Err(GroupError::InvalidGroupElement)
        );
    }

    #[test]
    fn test_members_of_another_group_rejected() {
        let group = test_group();
        let small = ZpSubgroup::new(BigInt::from_u8(23), BigInt::from_u8(11), BigInt::from_u8(4))
            .unwrap();

        // 13 is in the order-11 subgroup mod 23 but not in the test group
        let foreign = small.element(BigInt::from_u8(13)).unwrap();
        assert!(!group.is_member(foreign.value()));
        assert_eq!(
            group.pow(&foreign, &group.exponent_from_u64(3)),
            Err(GroupError::InvalidGroupElement)
        );
        assert_eq!(
            group.multiply(&foreign, &group.generator()),
            Err(GroupError::InvalidGroupElement)
        );
        assert_eq!(group.inverse(&foreign), Err(GroupError::InvalidGroupElement));
    }

    #[test]
    fn test_hash_to_element_exhausted() {
        let group = test_group();
        let hasher = HashBuilder::new(HashPolicy::default());
        assert_eq!(
            group.hash_to_element_within(&hasher, b"input", 0),
            Err(HashError::HashToGroupExhausted { attempts: 0 })
        );
    }

    #[test]
    fn test_derive_exponent() {
        let group = test_group();
        let hasher = HashBuilder::new(HashPolicy::default());

        let a = group.derive_exponent(&hasher, b"card", b"key", b"one").unwrap();
        let b = group.derive_exponent(&hasher, b"card", b"key", b"two").unwrap();
        let c = group.derive_exponent(&hasher, b"other card", b"key", b"one").unwrap();
        assert!(!a.exponent().is_zero());
        assert!(a.exponent().value() < group.q());
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(
            a,
            group.derive_exponent(&hasher, b"card", b"key", b"one").unwrap()
        );

        assert!(matches!(
            group.derive_exponent_within(&hasher, b"card", b"key", b"one", 0),
            Err(HashError::ExponentDerivationExhausted { attempts: 0 })
        ));
    }

    #[test]
    fn test_hash_to_element() {
        let group = test_group();
        let hasher = HashBuilder::new(HashPolicy::default());

        let a = group.hash_to_element(&hasher, b"ciphertext one").unwrap();
        let b = group.hash_to_element(&hasher, b"ciphertext two").unwrap();
        assert!(group.is_member(a.value()));
        assert!(!a.is_identity());
        assert_ne!(a, b);
        assert_eq!(a, group.hash_to_element(&hasher, b"ciphertext one").unwrap());
    }

    #[test]
    fn test_fixed_width_encoding() {
        let group = test_group();
        let one = group.identity();
        let bytes = group.to_bytes(&one);
        assert_eq!(bytes.len(), 16);
        assert_eq!(bytes[15], 1);
        assert!(bytes[..15].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_private_exponent_is_redacted() {
        let mut rng = ChaCha20Rng::from_seed([2u8; 32]);
        let group = test_group();
        let secret = group.random_private_exponent(&mut rng);
        assert_eq!(format!("{:?}", secret), "PrivateExponent(<redacted>)");
        assert!(!secret.exponent().is_zero());
    }
}
