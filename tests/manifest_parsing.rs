//! End-to-end Berksfile group parsing (`SPEC_FULL.md` §8 scenario 6).

use larder::berksfile;

#[test]
fn two_groups_each_tag_their_own_aws_cookbook() {
    let input = "group :base do\n  cookbook 'aws'\nend\ngroup :production do\n  cookbook 'aws'\nend\n";
    let manifest = berksfile::parse(input).unwrap();

    assert_eq!(manifest.groups.len(), 2);

    let base = &manifest.groups["base"];
    assert_eq!(base.len(), 1);
    assert_eq!(base[0].name, "aws");

    let production = &manifest.groups["production"];
    assert_eq!(production.len(), 1);
    assert_eq!(production[0].name, "aws");
}
