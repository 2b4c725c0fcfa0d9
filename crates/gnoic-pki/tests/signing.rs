//! End-to-end CA flow: a device returns an RSA CSR, the local CA signs it.

use std::sync::OnceLock;
use std::time::Duration;

use chrono::Utc;
use gnoic_pki::{validate_certificate, CaConfig, CertificateAuthority, Csr, SubjectAltName};
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use test_case::test_case;

fn ca() -> &'static CertificateAuthority {
    static CA: OnceLock<CertificateAuthority> = OnceLock::new();
    CA.get_or_init(|| {
        CertificateAuthority::create(&CaConfig {
            common_name: "rotation CA".into(),
            organization: "Lab".into(),
            ..CaConfig::default()
        })
        .unwrap()
    })
}

/// A 2048-bit RSA CSR as a device would produce it.
fn rsa_device_csr() -> &'static str {
    static CSR: OnceLock<String> = OnceLock::new();
    CSR.get_or_init(|| {
        let key = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
        let pem = key.to_pkcs8_pem(LineEnding::LF).unwrap();
        let key_pair = rcgen::KeyPair::from_pem_and_sign_algo(&pem, &rcgen::PKCS_RSA_SHA256).unwrap();
        let mut params =
            rcgen::CertificateParams::new(vec!["spine1.lab".into(), "198.51.100.7".into()]).unwrap();
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, "spine1");
        params
            .distinguished_name
            .push(rcgen::DnType::CountryName, "NL");
        params.serialize_request(&key_pair).unwrap().pem().unwrap()
    })
}

#[test_case(24; "one day")]
#[test_case(87_600; "ten years")]
fn signs_rsa_csr(hours: u64) {
    let csr = Csr::from_pem(rsa_device_csr().as_bytes()).unwrap();
    let start = Utc::now();
    let cert = ca()
        .sign_csr(&csr, Duration::from_secs(hours * 3600))
        .unwrap();

    assert!(cert.pem().starts_with("-----BEGIN CERTIFICATE-----\n"));
    assert_eq!(cert.subject(), csr.subject());
    assert!(cert.not_before() <= Utc::now());
    let expected = start + chrono::Duration::hours(i64::try_from(hours).unwrap());
    assert!((cert.not_after() - expected).num_seconds().abs() <= 1);
    assert!(cert.san().contains(&SubjectAltName::Dns("spine1.lab".into())));
    validate_certificate(&cert, ca().certificate()).unwrap();
}

#[test]
fn signed_pem_reparses() {
    let csr = Csr::from_pem(rsa_device_csr().as_bytes()).unwrap();
    let cert = ca().sign_csr(&csr, Duration::from_secs(3600)).unwrap();
    let again = gnoic_pki::Certificate::from_pem(cert.pem().as_bytes()).unwrap();
    assert_eq!(again.der(), cert.der());
}
