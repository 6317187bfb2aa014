use crate::*;

use burst_datapath::DatapathError;

fn temp_config(name: &str, text: &str) -> Result<std::path::PathBuf> {
    let dir = std::env::temp_dir().join(format!("burst-it-{name}-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("config.toml");
    std::fs::write(&path, text)?;
    Ok(path)
}

#[test]
fn test_file_config_drives_transport() -> Result<()> {
    let path = temp_config(
        "file",
        "[wire]\nmtu = 1058\n\n[rx]\nbatch_size = 4\nring_entries = 16\n",
    )?;
    let config = DatapathConfig::load_from(path.clone())?;
    let t = transport_with(&config, |pool| SimPort::new(pool, 1))?;

    assert_eq!(t.max_data_per_pkt(), 1000);
    assert_eq!(t.rx_ring().capacity(), 16);
    let _ = std::fs::remove_dir_all(path.parent().context("config dir")?);
    Ok(())
}

#[test]
fn test_invalid_config_is_rejected() -> Result<()> {
    let mut config = test_config();
    config.wire.mtu = 4096;
    let Err(err) = transport_with(&config, |pool| SimPort::new(pool, 1)) else {
        bail!("mtu beyond the mbuf data room was accepted");
    };
    let err = err
        .downcast_ref::<DatapathError>()
        .context("expected a datapath error")?;
    assert!(matches!(err, DatapathError::MtuTooLarge { mtu: 4096, .. }));

    let mut config = test_config();
    config.rx.ring_entries = config.rx.batch_size;
    let Err(err) = transport_with(&config, |pool| SimPort::new(pool, 1)) else {
        bail!("ring no larger than one poll was accepted");
    };
    assert!(format!("{err:#}").contains("cannot absorb"));
    Ok(())
}
