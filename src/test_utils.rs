#[cfg(test)]
pub mod fixtures {
    use chrono::{DateTime, Duration, Utc};
    use openssl::asn1::Asn1Time;
    use openssl::bn::BigNum;
    use openssl::ec::{EcGroup, EcKey};
    use openssl::hash::MessageDigest;
    use openssl::nid::Nid;
    use openssl::pkey::{PKey, Private};
    use openssl::x509::{X509Builder, X509NameBuilder, X509};

    fn key() -> PKey<Private> {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
    }

    fn build(cn: Option<&str>, not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> X509 {
        let key = key();

        let mut name = X509NameBuilder::new().unwrap();
        match cn {
            Some(cn) => name.append_entry_by_nid(Nid::COMMONNAME, cn).unwrap(),
            None => name
                .append_entry_by_nid(Nid::ORGANIZATIONNAME, "No CN Ltd")
                .unwrap(),
        }
        let name = name.build();

        let mut builder = X509Builder::new().unwrap();
        builder.set_version(2).unwrap();
        let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
        builder.set_serial_number(&serial).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(&key).unwrap();
        builder
            .set_not_before(&Asn1Time::from_unix(not_before.timestamp()).unwrap())
            .unwrap();
        builder
            .set_not_after(&Asn1Time::from_unix(not_after.timestamp()).unwrap())
            .unwrap();
        builder.sign(&key, MessageDigest::sha256()).unwrap();
        builder.build()
    }

    /// Self-signed certificate with subject and issuer CN `cn`.
    pub fn certificate(cn: &str, not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> X509 {
        build(Some(cn), not_before, not_after)
    }

    pub fn certificate_without_cn(not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> X509 {
        build(None, not_before, not_after)
    }

    /// PEM encoding of a certificate valid from a day ago for `days` days.
    pub fn pem(cn: &str, days: i64) -> Vec<u8> {
        let now = Utc::now();
        certificate(cn, now - Duration::days(1), now + Duration::days(days))
            .to_pem()
            .unwrap()
    }

    pub fn der(cn: &str, days: i64) -> Vec<u8> {
        let now = Utc::now();
        certificate(cn, now - Duration::days(1), now + Duration::days(days))
            .to_der()
            .unwrap()
    }

    /// A PEM block labelled CERTIFICATE whose body is valid base64 but not DER.
    pub fn malformed_certificate_pem() -> Vec<u8> {
        b"-----BEGIN CERTIFICATE-----\nbm90IGEgY2VydGlmaWNhdGUgYXQgYWxs\n-----END CERTIFICATE-----\n"
            .to_vec()
    }

    pub fn private_key_pem() -> Vec<u8> {
        key().private_key_to_pem_pkcs8().unwrap()
    }
}
